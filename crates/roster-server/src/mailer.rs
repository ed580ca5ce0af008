//! Queued, best-effort mail delivery.
//!
//! [`MailQueue`] is the server's [`Notifier`]: it hands each notification to a
//! bounded channel and returns. A single worker task renders the text
//! template and passes the result to a [`MailTransport`]. Nothing is retried;
//! every failure is logged and the message dropped.

use std::{
  collections::BTreeMap,
  future::Future,
  path::{Path, PathBuf},
};

use roster_core::notify::{Notification, Notifier};
use thiserror::Error;
use tokio::{
  sync::mpsc::{self, error::TrySendError},
  task::JoinHandle,
};

// ─── Messages ────────────────────────────────────────────────────────────────

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
  pub to:      String,
  pub subject: String,
  pub body:    String,
}

#[derive(Debug, Error)]
pub enum MailError {
  #[error("cannot read template {path}: {source}")]
  Template {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("transport error: {0}")]
  Transport(String),
}

/// Delivers rendered mail.
pub trait MailTransport: Send + Sync + 'static {
  fn send(
    &self,
    mail: OutgoingMail,
  ) -> impl Future<Output = Result<(), MailError>> + Send + '_;
}

/// Writes every message to the log instead of sending it.
pub struct LogTransport;

impl MailTransport for LogTransport {
  async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
    tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "mail");
    Ok(())
  }
}

// ─── Templates ───────────────────────────────────────────────────────────────

/// Renders `{dir}/{template}.txt`, replacing `{key}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
  dir:      PathBuf,
  /// Variables available to every template, overridable per message.
  defaults: BTreeMap<String, String>,
}

impl TemplateRenderer {
  pub fn new(dir: impl AsRef<Path>, dashboard_url: &str) -> Self {
    let mut defaults = BTreeMap::new();
    defaults.insert("dashboard_url".to_owned(), dashboard_url.to_owned());
    Self { dir: dir.as_ref().to_path_buf(), defaults }
  }

  pub async fn render(&self, notification: &Notification) -> Result<String, MailError> {
    let path = self.dir.join(format!("{}.txt", notification.template));
    let template = tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| MailError::Template { path, source })?;
    Ok(fill(&template, self.defaults.iter().chain(&notification.variables)))
  }
}

/// Substitute `{key}` for each variable; later duplicates win. Unknown
/// placeholders are left as they are.
fn fill<'a>(
  template: &str,
  variables: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> String {
  let merged: BTreeMap<&str, &str> = variables
    .into_iter()
    .map(|(k, v)| (k.as_str(), v.as_str()))
    .collect();
  merged
    .into_iter()
    .fold(template.to_owned(), |text, (k, v)| text.replace(&format!("{{{k}}}"), v))
}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// The sending half of the mail queue.
#[derive(Clone)]
pub struct MailQueue {
  tx: mpsc::Sender<Notification>,
}

impl MailQueue {
  /// Create the queue and spawn its worker.
  pub fn spawn<T: MailTransport>(
    capacity: usize,
    renderer: TemplateRenderer,
    transport: T,
  ) -> (Self, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let worker = tokio::spawn(deliver_loop(rx, renderer, transport));
    (Self { tx }, worker)
  }
}

impl Notifier for MailQueue {
  fn notify(&self, notification: Notification) {
    match self.tx.try_send(notification) {
      Ok(()) => {}
      Err(TrySendError::Full(n)) => {
        tracing::warn!(to = %n.to, template = %n.template, "mail queue full; dropping");
      }
      Err(TrySendError::Closed(n)) => {
        tracing::warn!(to = %n.to, template = %n.template, "mail worker gone; dropping");
      }
    }
  }
}

async fn deliver_loop<T: MailTransport>(
  mut rx: mpsc::Receiver<Notification>,
  renderer: TemplateRenderer,
  transport: T,
) {
  while let Some(notification) = rx.recv().await {
    let body = match renderer.render(&notification).await {
      Ok(body) => body,
      Err(e) => {
        tracing::warn!(to = %notification.to, error = %e, "cannot render mail");
        continue;
      }
    };
    let mail = OutgoingMail { to: notification.to, subject: notification.subject, body };
    let to = mail.to.clone();
    if let Err(e) = transport.send(mail).await {
      tracing::warn!(%to, error = %e, "mail delivery failed");
    }
  }
  tracing::debug!("mail queue closed");
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[derive(Clone, Default)]
  struct Capture(Arc<Mutex<Vec<OutgoingMail>>>);

  impl MailTransport for Capture {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
      self.0.lock().unwrap().push(mail);
      Ok(())
    }
  }

  fn template_dir(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("roster-mail-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{name}.txt")), body).unwrap();
    dir
  }

  #[test]
  fn placeholders_are_filled() {
    let vars = BTreeMap::from([
      ("name".to_owned(), "Bob".to_owned()),
      ("group_name".to_owned(), "LG Aachen".to_owned()),
    ]);
    assert_eq!(
      fill("Hi {name}, see {group_name} at {dashboard_url}", &vars),
      "Hi Bob, see LG Aachen at {dashboard_url}"
    );
  }

  #[tokio::test]
  async fn worker_renders_and_sends() {
    let dir = template_dir("hello", "Hello {name}, visit {dashboard_url}.");
    let capture = Capture::default();
    let (queue, worker) = MailQueue::spawn(
      4,
      TemplateRenderer::new(&dir, "https://dash.example.org"),
      capture.clone(),
    );

    queue.notify(Notification::new("bob@example.org", "Hi", "hello").var("name", "Bob"));
    queue.notify(Notification::new("x@example.org", "Missing", "no_such_template"));
    drop(queue);
    worker.await.unwrap();

    let sent = capture.0.lock().unwrap().clone();
    assert_eq!(
      sent,
      [OutgoingMail {
        to:      "bob@example.org".into(),
        subject: "Hi".into(),
        body:    "Hello Bob, visit https://dash.example.org.".into(),
      }]
    );
  }

  #[tokio::test]
  async fn full_queue_drops_instead_of_blocking() {
    let (tx, mut rx) = mpsc::channel(1);
    let queue = MailQueue { tx };
    queue.notify(Notification::new("a@example.org", "1", "t"));
    queue.notify(Notification::new("b@example.org", "2", "t"));

    assert_eq!(rx.recv().await.unwrap().to, "a@example.org");
    assert!(rx.try_recv().is_err());
  }
}
