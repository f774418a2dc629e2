use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        output::{AudioOutput, DecodeOptions},
        queue::{Track, TrackQueue},
    },
    error::MusicError,
    sources::TrackResolver,
};

/// Estado de reproducción de una guild.
///
/// `Skipping` es transitorio: lo deja `skip()` y lo consume el callback de
/// fin de track, que es el único que vuelve a avanzar la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Skipping,
}

/// Estado completo de una guild: cola, estado y pista en curso.
#[derive(Debug)]
struct GuildSession {
    queue: TrackQueue,
    state: PlaybackState,
    current: Option<Track>,
}

impl Default for GuildSession {
    fn default() -> Self {
        Self {
            queue: TrackQueue::new(),
            state: PlaybackState::Idle,
            current: None,
        }
    }
}

/// Avisos de reproducción hacia el canal de texto de la guild.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackNotifier: Send + Sync {
    async fn now_playing(&self, guild_id: GuildId, track: &Track);
    async fn track_failed(&self, guild_id: GuildId, title: &str, error: &MusicError);
    async fn queue_drained(&self, guild_id: GuildId);
}

/// Máquina de estados de reproducción, una por guild.
///
/// Todo el estado vive detrás de un mutex por guild: `enqueue`, `skip` y el
/// callback de fin de track quedan totalmente ordenados entre sí, y dos
/// guilds nunca compiten. A lo sumo hay un avance de cola en vuelo por
/// guild, y cada stream terminado (fin normal, error o skip) produce
/// exactamente un avance, disparado únicamente desde el callback.
pub struct PlaybackController {
    sessions: DashMap<GuildId, Arc<Mutex<GuildSession>>>,
    resolver: Arc<dyn TrackResolver>,
    output: Arc<dyn AudioOutput>,
    notifier: Arc<dyn PlaybackNotifier>,
    options: DecodeOptions,
    resolve_timeout: Duration,
}

impl PlaybackController {
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        output: Arc<dyn AudioOutput>,
        notifier: Arc<dyn PlaybackNotifier>,
        options: DecodeOptions,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver,
            output,
            notifier,
            options,
            resolve_timeout,
        }
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<GuildSession>> {
        self.sessions.entry(guild_id).or_default().clone()
    }

    /// Encola una pista y devuelve su posición. Si la guild está inactiva,
    /// avanza la cola sin soltar el lock, así ningún otro camino puede
    /// iniciar un segundo avance.
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> usize {
        let session = self.session(guild_id);
        let mut session = session.lock().await;

        let position = session.queue.push(track);
        debug!(
            "➕ Pista encolada en guild {} (posición {})",
            guild_id, position
        );

        if session.state == PlaybackState::Idle {
            self.advance(guild_id, &mut session).await;
        }

        position
    }

    /// Salta la pista en curso. Solo detiene el stream; el avance lo hace
    /// el callback de fin de track cuando songbird confirma el cierre.
    pub async fn skip(&self, guild_id: GuildId) -> Result<String, MusicError> {
        let session = self.session(guild_id);
        let mut session = session.lock().await;

        if session.state != PlaybackState::Playing {
            return Err(MusicError::NothingPlaying);
        }

        let title = session
            .current
            .as_ref()
            .map(|t| t.display_title.clone())
            .unwrap_or_else(|| "pista actual".to_string());

        session.state = PlaybackState::Skipping;
        self.output.stop(guild_id).await;

        info!("⏭️ Skip solicitado en guild {}: {}", guild_id, title);
        Ok(title)
    }

    /// Callback de fin de stream. Songbird lo dispara exactamente una vez
    /// por stream (fin normal, error o stop), fuera de la pila del comando.
    pub async fn on_track_end(&self, guild_id: GuildId) {
        let session = self.session(guild_id);
        let mut session = session.lock().await;

        let title = session
            .current
            .as_ref()
            .map(|t| t.display_title.clone())
            .unwrap_or_default();

        match session.state {
            // Evento rezagado de un stream que ya dimos de baja (leave o
            // desconexión forzada): no hay nada que avanzar.
            PlaybackState::Idle => {
                debug!("Evento de fin sin stream activo en guild {}", guild_id);
                return;
            }
            PlaybackState::Skipping => {
                info!("⏭️ Pista saltada en guild {}: {}", guild_id, title)
            }
            PlaybackState::Playing => {
                info!("✅ Pista terminada en guild {}: {}", guild_id, title)
            }
        }

        session.state = PlaybackState::Idle;
        session.current = None;
        self.advance(guild_id, &mut session).await;
    }

    /// Corta la reproducción y abandona el canal de voz. La cola sobrevive:
    /// el próximo comando de reproducción vuelve a conectarse y retoma.
    pub async fn disconnect(&self, guild_id: GuildId) {
        let session = self.session(guild_id);
        let mut session = session.lock().await;

        session.state = PlaybackState::Idle;
        session.current = None;

        self.output.stop(guild_id).await;
        self.output.disconnect(guild_id).await;
    }

    /// Pista en curso y pendientes, en orden, para mostrar la cola.
    pub async fn queue_snapshot(&self, guild_id: GuildId) -> (Option<Track>, Vec<Track>) {
        let session = self.session(guild_id);
        let session = session.lock().await;

        (
            session.current.clone(),
            session.queue.iter().cloned().collect(),
        )
    }

    pub async fn current_title(&self, guild_id: GuildId) -> Option<String> {
        let session = self.session(guild_id);
        let session = session.lock().await;
        session.current.as_ref().map(|t| t.display_title.clone())
    }

    /// Avanza la cola: saca la primera pista resoluble y la pone a sonar, o
    /// queda inactivo y se desconecta si la cola se agotó.
    ///
    /// El reintento ante fallos de resolución está acotado por la longitud
    /// de la cola al entrar: una cola entera de pistas irresolubles termina
    /// drenada, no en recursión infinita.
    async fn advance(&self, guild_id: GuildId, session: &mut GuildSession) {
        if !self.output.is_connected(guild_id) {
            session.state = PlaybackState::Idle;
            session.current = None;
            return;
        }

        let attempts = session.queue.len();
        for _ in 0..attempts {
            let Some(track) = session.queue.pop_front() else {
                break;
            };

            let resolved = match tokio::time::timeout(
                self.resolve_timeout,
                self.resolver
                    .resolve_stream(&track.source_reference, &self.options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(MusicError::ResolveTimeout),
            };

            let locator = match resolved {
                Ok(locator) => locator,
                Err(e) => {
                    warn!(
                        "❌ No se pudo resolver {} en guild {}: {}",
                        track.display_title, guild_id, e
                    );
                    self.notifier
                        .track_failed(guild_id, &track.display_title, &e)
                        .await;
                    continue;
                }
            };

            match self
                .output
                .begin_stream(guild_id, &locator, &self.options)
                .await
            {
                Ok(()) => {
                    info!(
                        "🎵 Reproduciendo en guild {}: {}",
                        guild_id, track.display_title
                    );
                    session.state = PlaybackState::Playing;
                    self.notifier.now_playing(guild_id, &track).await;
                    session.current = Some(track);
                    return;
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo iniciar {} en guild {}: {}",
                        track.display_title, guild_id, e
                    );
                    self.notifier
                        .track_failed(guild_id, &track.display_title, &e)
                        .await;
                }
            }
        }

        info!("📭 Cola agotada en guild {}, desconectando", guild_id);
        session.state = PlaybackState::Idle;
        session.current = None;
        self.notifier.queue_drained(guild_id).await;
        self.output.disconnect(guild_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::MockAudioOutput;
    use crate::sources::MockTrackResolver;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn guild() -> GuildId {
        GuildId::new(99)
    }

    fn track(reference: &str) -> Track {
        Track {
            source_reference: reference.to_string(),
            display_title: reference.to_uppercase(),
            uploader: None,
            requested_by: UserId::new(7),
            enqueued_at: Utc::now(),
            duration: None,
            thumbnail: None,
        }
    }

    /// Registra lo que el controlador pidió a sus colaboradores.
    struct Recorder {
        resolves: Arc<StdMutex<Vec<String>>>,
        streams: Arc<StdMutex<Vec<String>>>,
        stops: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
        failures: Arc<StdMutex<Vec<String>>>,
        drains: Arc<AtomicUsize>,
        connected: Arc<AtomicBool>,
    }

    impl Recorder {
        fn streams(&self) -> Vec<String> {
            self.streams.lock().unwrap().clone()
        }

        fn resolve_count(&self) -> usize {
            self.resolves.lock().unwrap().len()
        }

        fn failures(&self) -> Vec<String> {
            self.failures.lock().unwrap().clone()
        }
    }

    fn controller_with(failing: &[&str]) -> (PlaybackController, Recorder) {
        let recorder = Recorder {
            resolves: Arc::new(StdMutex::new(Vec::new())),
            streams: Arc::new(StdMutex::new(Vec::new())),
            stops: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(StdMutex::new(Vec::new())),
            drains: Arc::new(AtomicUsize::new(0)),
            connected: Arc::new(AtomicBool::new(true)),
        };
        let failing: HashSet<String> = failing.iter().map(|s| s.to_string()).collect();

        let mut resolver = MockTrackResolver::new();
        {
            let resolves = recorder.resolves.clone();
            resolver.expect_resolve_stream().returning(move |reference, _| {
                resolves.lock().unwrap().push(reference.to_string());
                if failing.contains(reference) {
                    Err(MusicError::Resolution("fallo simulado".to_string()))
                } else {
                    Ok(format!("https://cdn.example/{reference}"))
                }
            });
        }

        let mut output = MockAudioOutput::new();
        {
            let connected = recorder.connected.clone();
            output
                .expect_is_connected()
                .returning(move |_| connected.load(Ordering::SeqCst));

            let streams = recorder.streams.clone();
            output.expect_begin_stream().returning(move |_, locator, _| {
                streams.lock().unwrap().push(locator.to_string());
                Ok(())
            });

            let stops = recorder.stops.clone();
            output.expect_stop().returning(move |_| {
                stops.fetch_add(1, Ordering::SeqCst);
            });

            let disconnects = recorder.disconnects.clone();
            let connected = recorder.connected.clone();
            output.expect_disconnect().returning(move |_| {
                disconnects.fetch_add(1, Ordering::SeqCst);
                connected.store(false, Ordering::SeqCst);
            });
        }

        let mut notifier = MockPlaybackNotifier::new();
        {
            notifier.expect_now_playing().returning(|_, _| ());

            let failures = recorder.failures.clone();
            notifier.expect_track_failed().returning(move |_, title, _| {
                failures.lock().unwrap().push(title.to_string());
            });

            let drains = recorder.drains.clone();
            notifier.expect_queue_drained().returning(move |_| {
                drains.fetch_add(1, Ordering::SeqCst);
            });
        }

        let controller = PlaybackController::new(
            Arc::new(resolver),
            Arc::new(output),
            Arc::new(notifier),
            DecodeOptions::default(),
            Duration::from_secs(5),
        );
        (controller, recorder)
    }

    #[tokio::test]
    async fn enqueue_while_idle_triggers_exactly_one_advance() {
        let (controller, recorder) = controller_with(&[]);

        let position = controller.enqueue(guild(), track("a")).await;
        assert_eq!(position, 1);
        assert_eq!(recorder.streams(), vec!["https://cdn.example/a"]);

        // Ya hay algo sonando: encolar no vuelve a avanzar.
        controller.enqueue(guild(), track("b")).await;
        controller.enqueue(guild(), track("c")).await;
        assert_eq!(recorder.resolve_count(), 1);
        assert_eq!(recorder.streams().len(), 1);

        let (current, pending) = controller.queue_snapshot(guild()).await;
        assert_eq!(current.unwrap().display_title, "A");
        let titles: Vec<String> = pending.into_iter().map(|t| t.display_title).collect();
        assert_eq!(titles, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn completion_chains_through_queue_then_drains() {
        let (controller, recorder) = controller_with(&[]);

        controller.enqueue(guild(), track("a")).await;
        controller.enqueue(guild(), track("b")).await;

        // Termina A: el callback avanza a B.
        controller.on_track_end(guild()).await;
        assert_eq!(
            recorder.streams(),
            vec!["https://cdn.example/a", "https://cdn.example/b"]
        );

        // Termina B con la cola vacía: inactivo y desconexión, sin tocar el
        // resolver de nuevo.
        controller.on_track_end(guild()).await;
        assert_eq!(recorder.resolve_count(), 2);
        assert_eq!(recorder.drains.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 1);

        let (current, pending) = controller.queue_snapshot(guild()).await;
        assert!(current.is_none());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn dequeue_order_is_fifo_for_any_interleaving() {
        let (controller, recorder) = controller_with(&[]);

        controller.enqueue(guild(), track("a")).await;
        controller.enqueue(guild(), track("b")).await;
        controller.on_track_end(guild()).await;
        controller.enqueue(guild(), track("c")).await;
        controller.enqueue(guild(), track("d")).await;
        controller.on_track_end(guild()).await;
        controller.on_track_end(guild()).await;

        assert_eq!(
            recorder.streams(),
            vec![
                "https://cdn.example/a",
                "https://cdn.example/b",
                "https://cdn.example/c",
                "https://cdn.example/d",
            ]
        );
    }

    #[tokio::test]
    async fn skip_stops_once_and_advances_only_from_the_callback() {
        let (controller, recorder) = controller_with(&[]);

        controller.enqueue(guild(), track("a")).await;
        controller.enqueue(guild(), track("b")).await;

        let skipped = controller.skip(guild()).await.unwrap();
        assert_eq!(skipped, "A");
        assert_eq!(recorder.stops.load(Ordering::SeqCst), 1);

        // El skip en sí no avanzó nada.
        assert_eq!(recorder.streams().len(), 1);
        assert_eq!(recorder.resolve_count(), 1);

        // El callback de fin de stream produce exactamente un avance.
        controller.on_track_end(guild()).await;
        assert_eq!(
            recorder.streams(),
            vec!["https://cdn.example/a", "https://cdn.example/b"]
        );
    }

    #[tokio::test]
    async fn skip_with_nothing_playing_is_rejected() {
        let (controller, _recorder) = controller_with(&[]);

        let result = controller.skip(guild()).await;
        assert!(matches!(result, Err(MusicError::NothingPlaying)));
    }

    #[tokio::test]
    async fn skip_of_last_track_drains_and_disconnects() {
        let (controller, recorder) = controller_with(&[]);

        controller.enqueue(guild(), track("a")).await;
        controller.skip(guild()).await.unwrap();
        controller.on_track_end(guild()).await;

        assert_eq!(recorder.drains.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.streams().len(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_is_reported_once_and_queue_continues() {
        let (controller, recorder) = controller_with(&["b"]);

        controller.enqueue(guild(), track("a")).await;
        controller.enqueue(guild(), track("b")).await;
        controller.enqueue(guild(), track("c")).await;

        // Termina A: B falla al resolver, C suena.
        controller.on_track_end(guild()).await;

        assert_eq!(recorder.failures(), vec!["B"]);
        assert_eq!(
            recorder.streams(),
            vec!["https://cdn.example/a", "https://cdn.example/c"]
        );
    }

    #[tokio::test]
    async fn all_failing_queue_attempts_each_track_once_then_drains() {
        let (controller, recorder) = controller_with(&["b", "c", "d"]);

        controller.enqueue(guild(), track("a")).await;
        for reference in ["b", "c", "d"] {
            controller.enqueue(guild(), track(reference)).await;
        }

        controller.on_track_end(guild()).await;

        // Un intento de resolución por pista, ni más ni menos.
        assert_eq!(recorder.resolve_count(), 4);
        assert_eq!(recorder.failures(), vec!["B", "C", "D"]);
        assert_eq!(recorder.drains.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.streams().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_without_voice_connection_stays_idle() {
        let (controller, recorder) = controller_with(&[]);
        recorder.connected.store(false, Ordering::SeqCst);

        controller.enqueue(guild(), track("a")).await;

        assert_eq!(recorder.resolve_count(), 0);
        assert!(recorder.streams().is_empty());

        // La pista queda pendiente para cuando haya conexión.
        let (current, pending) = controller.queue_snapshot(guild()).await;
        assert!(current.is_none());
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn stale_track_end_without_active_stream_is_ignored() {
        let (controller, recorder) = controller_with(&[]);

        controller.on_track_end(guild()).await;

        assert_eq!(recorder.resolve_count(), 0);
        assert_eq!(recorder.drains.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disconnect_resets_playback_but_keeps_pending_queue() {
        let (controller, recorder) = controller_with(&[]);

        controller.enqueue(guild(), track("a")).await;
        controller.enqueue(guild(), track("b")).await;

        controller.disconnect(guild()).await;
        assert_eq!(recorder.stops.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 1);

        // El evento de fin que genera el stop llega tarde y no reavanza.
        controller.on_track_end(guild()).await;
        assert_eq!(recorder.streams().len(), 1);

        let (current, pending) = controller.queue_snapshot(guild()).await;
        assert!(current.is_none());
        assert_eq!(pending.len(), 1);
    }
}
