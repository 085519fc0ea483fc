use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use glot_core::{ArtifactReceiver, PendingArtifact};

/// Receiver that "receives" a prepared file for every listen.
#[derive(Clone, Default)]
pub struct StaticReceiver {
    pub delivers: Option<PathBuf>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl StaticReceiver {
    pub fn delivering(path: PathBuf) -> Self {
        Self {
            delivers: Some(path),
            log: Arc::default(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().expect("poisoned mutex").clone()
    }
}

impl ArtifactReceiver for StaticReceiver {
    fn listen(&self, filename: &str) -> Result<Box<dyn PendingArtifact>, String> {
        self.log
            .lock()
            .expect("poisoned mutex")
            .push(format!("listen {filename}"));
        Ok(Box::new(StaticPending {
            delivers: self.delivers.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct StaticPending {
    delivers: Option<PathBuf>,
    log: Arc<Mutex<Vec<String>>>,
}

impl PendingArtifact for StaticPending {
    fn wait(self: Box<Self>) -> Result<PathBuf, String> {
        self.log.lock().expect("poisoned mutex").push("wait".to_string());
        self.delivers.ok_or_else(|| "nothing to deliver".to_string())
    }

    fn cancel(self: Box<Self>) {
        self.log.lock().expect("poisoned mutex").push("cancel".to_string());
    }
}
