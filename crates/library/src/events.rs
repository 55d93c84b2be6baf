//! Change notifications for books
//!
//! A thin layer over `tokio::sync::broadcast`. Publishing never fails; with no
//! subscribers the event is simply dropped.

use folio_core::Book;
use log::debug;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    BookUpdated,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::BookUpdated => write!(f, "book.updated"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookEvent {
    pub topic: Topic,
    pub book: Book,
}

#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<BookEvent>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `book` on `topic`; returns how many subscribers received it
    pub fn publish(&self, topic: Topic, book: Book) -> usize {
        let book_id = book.id;
        match self.sender.send(BookEvent { topic, book }) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No subscribers for {} ({})", topic, book_id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookEvent> {
        self.sender.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
