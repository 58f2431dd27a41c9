//! Checks and messages for operations that need raw socket access.
use std::io;

/// Whether the process may open raw datalink channels.
#[cfg(unix)]
pub fn has_network_privileges() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(windows)]
pub fn has_network_privileges() -> bool {
    // no cheap runtime check; opening the channel reports it
    true
}

fn executable_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// How to grant the ARP probe the access it needs on this OS.
pub fn privilege_hint() -> String {
    #[cfg(unix)]
    {
        match std::env::consts::OS {
            "linux" => format!(
                "ARP probing needs raw socket access; falling back to the neighbor cache.\n\
                Run with sudo ({0}) or grant the capability once:\n\
                sudo setcap cap_net_raw,cap_net_admin+eip $(command -v {0})",
                executable_name()
            ),
            _ => format!(
                "ARP probing needs root privileges; falling back to the neighbor cache.\n\
                Run with sudo {}",
                executable_name()
            ),
        }
    }

    #[cfg(windows)]
    {
        format!(
            "ARP probing needs administrative privileges and the Npcap driver; falling back to \
            the neighbor cache.\nRun {} from an elevated prompt.",
            executable_name()
        )
    }
}

pub fn is_permission_error(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::PermissionDenied
}

/// Message for a failed datalink channel on `interface_name`.
pub fn datalink_error_message(error: &io::Error, interface_name: &str) -> String {
    if is_permission_error(error) {
        privilege_hint()
    } else {
        format!("cannot open a datalink channel on {interface_name}: {error}")
    }
}
