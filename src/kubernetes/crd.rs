// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{GROUP, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS, VERSION};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait until the OpenTelemetryCollector and Instrumentation CRDs are served.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_operator_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_operator_crds_exist(client).await {
            Ok(true) => {
                info!("CRDs ({}/{}) are available", GROUP, VERSION);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "CRDs ({}/{}) not yet available, waiting {} seconds...",
                    GROUP, VERSION, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Both kinds must be discoverable in the operator's API group
async fn check_operator_crds_exist(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[GROUP])
        .run()
        .await?;

    let mut kinds = Vec::new();
    for group in discovery.groups() {
        if group.name() == GROUP {
            for (ar, _) in group.recommended_resources() {
                if ar.version == VERSION {
                    kinds.push(ar.kind);
                }
            }
        }
    }

    Ok(crds_present(&kinds))
}

fn crds_present(kinds: &[String]) -> bool {
    ["OpenTelemetryCollector", "Instrumentation"]
        .iter()
        .all(|required| kinds.iter().any(|k| k == required))
}
