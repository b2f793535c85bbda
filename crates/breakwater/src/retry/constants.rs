// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::Backoff;

// The defaults follow resilience4j:
// <https://resilience4j.readme.io/docs/retry#create-and-configure-retry>

pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub(crate) const DEFAULT_BACKOFF: Backoff = Backoff::Constant;

pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

pub(crate) const DEFAULT_USE_JITTER: bool = false;
