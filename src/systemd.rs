//! Service manager notifications (`sd_notify`).
//!
//! Without `NOTIFY_SOCKET` in the environment every notification is a no-op.

#[derive(Debug)]
pub struct ProcessState {
    pub span: tracing::Span,
}

impl ProcessState {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("service"),
        }
    }

    fn set(&self, status: &str, states: &[NotifyState<'_>]) {
        tracing::debug!(parent: &self.span, status, "Setting service status");
        if let Err(error) = notify(states) {
            tracing::error!(parent: &self.span, ?error, "Failed to notify service manager of state change");
        } else {
            tracing::debug!(
                parent: &self.span,
                status,
                "Notified service manager of service status"
            );
        }
    }

    pub fn set_starting(&self) {
        self.set("starting", &[NotifyState::Status("starting")]);
    }

    /// All sockets are bound and the render loop is up.
    pub fn set_running(&self) {
        self.set("ready", &[NotifyState::Ready, NotifyState::Status("running")]);
    }

    pub fn set_failed(&self) {
        self.set(
            "failed,stopping",
            &[NotifyState::Status("failed"), NotifyState::Stopping],
        );
    }

    pub fn set_stopping(&self) {
        self.set("stopping", &[NotifyState::Stopping]);
    }
}

/// Daemon notification for the service manager.
#[derive(Clone, Debug)]
enum NotifyState<'a> {
    /// Service startup is finished.
    Ready,

    /// Service is stopping.
    Stopping,

    /// Free-form status message for the service manager.
    Status(&'a str),
}

impl std::fmt::Display for NotifyState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Status(msg) => write!(f, "STATUS={msg}"),
        }
    }
}

fn message(states: &[NotifyState<'_>]) -> String {
    use std::fmt::Write;

    let mut msg = String::new();
    for s in states {
        let _ = writeln!(msg, "{s}");
    }
    msg
}

fn connect_notify_socket() -> std::io::Result<Option<std::os::unix::net::UnixDatagram>> {
    let Some(socket_path) = std::env::var_os("NOTIFY_SOCKET") else {
        return Ok(None);
    };

    let sock = std::os::unix::net::UnixDatagram::unbound()?;

    sock.connect(socket_path)?;

    Ok(Some(sock))
}

fn notify(states: &[NotifyState<'_>]) -> std::io::Result<()> {
    let Some(sock) = connect_notify_socket()? else {
        return Ok(());
    };

    let msg = message(states);
    let len = sock.send(msg.as_bytes())?;

    if len != msg.len() {
        Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "incomplete write",
        ))
    } else {
        Ok(())
    }
}
