use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;

use crate::models::status::StatusSample;
use crate::status::source::{StatusError, StatusSource};

#[derive(Debug, Clone)]
pub enum Reply {
    Online { players: i64, max: i64, motd: Option<String> },
    Offline,
    Error,
}

impl Reply {
    pub fn online(players: i64, max: i64) -> Self {
        Self::Online { players, max, motd: None }
    }
}

/// Status source answering from a per-address script. The last reply of a
/// script repeats forever; unscripted addresses fail.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, address: &str, replies: Vec<Reply>) {
        self.scripts.lock().insert(address.to_string(), replies.into());
    }

    pub fn calls_to(&self, address: &str) -> usize {
        self.calls.lock().iter().filter(|(a, _)| a == address).count()
    }

    pub fn call_times(&self, address: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, address: &str) -> Result<StatusSample, StatusError> {
        self.calls.lock().push((address.to_string(), Instant::now()));
        let reply = {
            let mut scripts = self.scripts.lock();
            match scripts.get_mut(address) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Online { players, max, motd }) => Ok(StatusSample {
                online: true,
                players,
                max_players: max,
                motd,
                version: Some("1.20.4".to_string()),
            }),
            Some(Reply::Offline) => Ok(StatusSample::offline()),
            Some(Reply::Error) | None => Err(StatusError::Transport("connection refused".to_string())),
        }
    }
}
