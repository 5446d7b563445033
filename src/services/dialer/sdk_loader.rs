//! SDK Loader
//!
//! Injects the vendor telephony script and resolves the SDK object it
//! publishes. Injection happens at most once per successful load:
//!
//! - a `load` while another is pending attaches to the pending one
//! - a `load` after a success returns the memoized SDK
//! - a failed load is forgotten, so the caller's next `load` injects again
//!
//! Retrying is the caller's job; the loader never retries on its own.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crm_dialer_core::{DialerError, DialerResult, ScriptHost, TelephonySdk};

type LoadResult = DialerResult<Arc<dyn TelephonySdk>>;
type PendingLoad = Shared<BoxFuture<'static, LoadResult>>;

enum LoadState {
    Idle,
    Loading { generation: u64, load: PendingLoad },
    Loaded(Arc<dyn TelephonySdk>),
}

struct LoaderState {
    state: LoadState,
    generation: u64,
}

pub struct SdkLoader {
    scripts: Arc<dyn ScriptHost>,
    script_url: String,
    global_names: Vec<String>,
    timeout: Duration,
    state: Mutex<LoaderState>,
}

impl SdkLoader {
    pub fn new(
        scripts: Arc<dyn ScriptHost>,
        script_url: impl Into<String>,
        global_names: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            scripts,
            script_url: script_url.into(),
            global_names,
            timeout,
            state: Mutex::new(LoaderState {
                state: LoadState::Idle,
                generation: 0,
            }),
        }
    }

    /// Load the SDK, injecting the script only if no load is pending or done.
    pub async fn load(&self) -> LoadResult {
        let (generation, pending) = {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let in_flight = match &guard.state {
                LoadState::Loaded(sdk) => return Ok(sdk.clone()),
                LoadState::Loading { generation, load } => Some((*generation, load.clone())),
                LoadState::Idle => None,
            };
            match in_flight {
                Some(attached) => {
                    debug!("SDK load already in flight, attaching");
                    attached
                }
                None => {
                    guard.generation += 1;
                    let generation = guard.generation;
                    let load = Self::inject(
                        self.scripts.clone(),
                        self.script_url.clone(),
                        self.global_names.clone(),
                        self.timeout,
                    )
                    .boxed()
                    .shared();
                    guard.state = LoadState::Loading {
                        generation,
                        load: load.clone(),
                    };
                    (generation, load)
                }
            }
        };

        let result = pending.await;

        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&guard.state, LoadState::Loading { generation: g, .. } if *g == generation) {
            guard.state = match &result {
                Ok(sdk) => LoadState::Loaded(sdk.clone()),
                Err(_) => LoadState::Idle,
            };
        }
        result
    }

    /// Whether an SDK object has been resolved.
    pub fn is_loaded(&self) -> bool {
        matches!(
            self.state.lock().unwrap_or_else(PoisonError::into_inner).state,
            LoadState::Loaded(_)
        )
    }

    async fn inject(
        scripts: Arc<dyn ScriptHost>,
        script_url: String,
        global_names: Vec<String>,
        timeout: Duration,
    ) -> LoadResult {
        info!("Injecting telephony SDK script: {}", script_url);

        match tokio::time::timeout(timeout, scripts.inject_script(&script_url)).await {
            Err(_) => {
                scripts.remove_script(&script_url);
                warn!("SDK script did not load within {}s", timeout.as_secs());
                return Err(DialerError::sdk_load(format!(
                    "script did not load within {}s",
                    timeout.as_secs()
                )));
            }
            Ok(Err(reason)) => {
                scripts.remove_script(&script_url);
                warn!("SDK script failed to load: {}", reason);
                return Err(DialerError::sdk_load(reason));
            }
            Ok(Ok(())) => {}
        }

        for name in &global_names {
            if let Some(sdk) = scripts.resolve_global(name) {
                debug!("Resolved telephony SDK from global '{}'", name);
                return Ok(sdk);
            }
        }

        scripts.remove_script(&script_url);
        Err(DialerError::sdk_load(format!(
            "script loaded but none of the globals [{}] is defined",
            global_names.join(", ")
        )))
    }
}
