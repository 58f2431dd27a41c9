use mac_oui::Oui;
use std::sync::Arc;

use super::records::{HostRecord, MacAddress};

/// Manufacturer lookup against the embedded IEEE OUI database.
#[derive(Clone)]
pub struct VendorLookup {
    oui: Arc<Oui>,
}

impl VendorLookup {
    /// Parses the embedded database on the blocking pool. `None` if it cannot be loaded.
    pub async fn load() -> Option<Self> {
        let loaded = tokio::task::spawn_blocking(|| Oui::default().map_err(|e| e.to_string())).await;
        match loaded {
            Ok(Ok(oui)) => Some(Self { oui: Arc::new(oui) }),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "vendor database unavailable");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "vendor database loader failed");
                None
            }
        }
    }

    pub fn company(&self, mac: &MacAddress) -> Option<String> {
        match self.oui.lookup_by_mac(&mac.to_string()) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            Ok(None) => None,
            Err(e) => {
                tracing::trace!(%mac, error = %e, "vendor lookup failed");
                None
            }
        }
    }

    pub fn annotate(&self, records: &mut [HostRecord]) {
        for record in records.iter_mut().filter(|r| r.vendor.is_none()) {
            record.vendor = self.company(&record.hardware_id);
        }
    }
}

impl std::fmt::Debug for VendorLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VendorLookup")
    }
}
