use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};

use crate::sources::ResolvedTrack;

/// Una pista encolada. Inmutable una vez creada.
#[derive(Debug, Clone)]
pub struct Track {
    /// URL original (página del video), lo que el resolver vuelve a recibir
    /// al momento de reproducir.
    pub source_reference: String,
    pub display_title: String,
    pub uploader: Option<String>,
    pub requested_by: UserId,
    pub enqueued_at: DateTime<Utc>,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

impl Track {
    pub fn from_resolved(resolved: ResolvedTrack, requested_by: UserId) -> Self {
        Self {
            source_reference: resolved.url,
            display_title: resolved.title,
            uploader: resolved.uploader,
            requested_by,
            enqueued_at: Utc::now(),
            duration: resolved.duration,
            thumbnail: resolved.thumbnail,
        }
    }
}

/// Cola FIFO de pistas de una guild. Orden de inserción = orden de
/// reproducción, sin límite de tamaño.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Agrega al final y devuelve la nueva longitud.
    pub fn push(&mut self, track: Track) -> usize {
        self.items.push_back(track);
        self.items.len()
    }

    /// Saca la primera pista. `None` cuando la cola se agotó.
    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Vista en orden para mostrar la cola, no muta.
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track {
            source_reference: format!("https://www.youtube.com/watch?v={title}"),
            display_title: title.to_string(),
            uploader: None,
            requested_by: UserId::new(1),
            enqueued_at: Utc::now(),
            duration: None,
            thumbnail: None,
        }
    }

    #[test]
    fn push_returns_queue_position() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);
        assert_eq!(queue.push(track("c")), 3);
    }

    #[test]
    fn pop_front_preserves_insertion_order() {
        let mut queue = TrackQueue::new();
        for title in ["a", "b", "c"] {
            queue.push(track(title));
        }

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_front())
            .map(|t| t.display_title)
            .collect();

        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_front_on_empty_queue_is_none() {
        let mut queue = TrackQueue::new();
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn iter_does_not_consume() {
        let mut queue = TrackQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));

        let titles: Vec<&str> = queue.iter().map(|t| t.display_title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(queue.len(), 2);
    }
}
