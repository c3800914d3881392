use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use reqwest::blocking::Client;

use crate::recognition::domain::match_notifier::MatchNotifier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports confident matches to the web application's check-in endpoint.
///
/// `notify` only queues the name; a dedicated thread posts `id=<name>` as a
/// form so a slow server never stalls the identity lane. Dropping the
/// notifier drains the queue and joins the thread.
pub struct HttpMatchNotifier {
    tx: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpMatchNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let url = url.into();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("match-notifier".into())
            .spawn(move || post_loop(client, url, rx))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }
}

fn post_loop(client: Client, url: String, rx: Receiver<String>) {
    for name in rx {
        let result = client
            .post(&url)
            .form(&[("id", name.as_str())])
            .send()
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => log::debug!("Reported match for {name}"),
            Err(e) => log::warn!("Failed to report match for {name} to {url}: {e}"),
        }
    }
}

impl MatchNotifier for HttpMatchNotifier {
    fn notify(&self, name: &str) {
        if let Some(tx) = &self.tx {
            if tx.send(name.to_string()).is_err() {
                log::warn!("Match notifier thread is gone; dropping {name}");
            }
        }
    }
}

impl Drop for HttpMatchNotifier {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
