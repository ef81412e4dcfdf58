use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    /// How long a toast of this kind stays up unless told otherwise.
    pub fn default_duration(self) -> Duration {
        match self {
            ToastKind::Success | ToastKind::Info => Duration::from_secs(5),
            ToastKind::Warning => Duration::from_secs(6),
            ToastKind::Error => Duration::from_secs(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
            duration: kind.default_duration(),
        }
    }
}

/// Observable list of user notifications. Dismissal timing is left to the UI.
pub struct Toasts {
    list: watch::Sender<Vec<Toast>>,
}

impl Toasts {
    pub fn new() -> Self {
        Self {
            list: watch::Sender::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.list.subscribe()
    }

    pub fn current(&self) -> Vec<Toast> {
        self.list.borrow().clone()
    }

    pub fn add(&self, toast: Toast) -> Uuid {
        let id = toast.id;
        self.list.send_modify(|list| list.push(toast));
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.add(Toast::new(ToastKind::Success, message))
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.add(Toast::new(ToastKind::Error, message))
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.add(Toast::new(ToastKind::Warning, message))
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.add(Toast::new(ToastKind::Info, message))
    }

    pub fn remove(&self, id: Uuid) {
        self.list.send_modify(|list| list.retain(|t| t.id != id));
    }

    pub fn clear(&self) {
        self.list.send_replace(Vec::new());
    }
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_carry_their_default_durations() {
        let toasts = Toasts::new();
        toasts.success("saved");
        toasts.error("failed");
        toasts.warning("careful");
        toasts.info("fyi");

        let durations: Vec<u64> = toasts.current().iter().map(|t| t.duration.as_secs()).collect();
        assert_eq!(durations, vec![5, 7, 6, 5]);
    }

    #[test]
    fn remove_drops_only_that_toast() {
        let toasts = Toasts::new();
        let first = toasts.info("one");
        let second = toasts.info("two");
        assert_ne!(first, second);

        toasts.remove(first);
        let left = toasts.current();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, second);

        toasts.clear();
        assert!(toasts.current().is_empty());
    }
}
