//! Text-to-speech through whatever engine the host has installed.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use log::{debug, info, warn};

pub const DEFAULT_LOCALE: &str = "en-US";

const SPD_SAY_CANCEL: &[&str] = &["-C"];

/// One utterance in flight.
pub trait Playback {
    fn is_finished(&mut self) -> io::Result<bool>;
    fn cancel(&mut self);
}

/// The raw speech capability.
pub trait Voice {
    fn start(&self, text: &str, locale: &str) -> io::Result<Box<dyn Playback>>;
}

impl Playback for Child {
    fn is_finished(&mut self) -> io::Result<bool> {
        Ok(self.try_wait()?.is_some())
    }

    fn cancel(&mut self) {
        let _ = self.kill();
        let _ = self.wait();
    }
}

/// A running engine process. Some engines only hand the text to a speech
/// daemon, so killing the process does not silence them; `stop` does.
#[derive(Debug)]
struct EnginePlayback {
    child: Child,
    stop: Option<Command>,
}

impl Playback for EnginePlayback {
    fn is_finished(&mut self) -> io::Result<bool> {
        self.child.is_finished()
    }

    fn cancel(&mut self) {
        self.child.cancel();
        if let Some(stop) = self.stop.as_mut() {
            match stop.status() {
                Ok(status) if !status.success() => debug!("stop command exited with {status}"),
                Ok(_) => {}
                Err(e) => warn!("failed to stop speech: {e}"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Engine {
    #[strum(serialize = "espeak-ng")]
    EspeakNg,
    #[strum(serialize = "espeak")]
    Espeak,
    #[strum(serialize = "spd-say")]
    SpdSay,
    #[strum(serialize = "say")]
    Say,
}

impl Engine {
    const SEARCH_ORDER: [Engine; 4] = [
        Engine::EspeakNg,
        Engine::Espeak,
        Engine::SpdSay,
        Engine::Say,
    ];

    /// Engine arguments, spoken a little slower than normal.
    pub fn args(&self, text: &str, locale: &str) -> Vec<String> {
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        match self {
            Engine::EspeakNg | Engine::Espeak => vec![
                "-s".into(),
                "140".into(),
                "-v".into(),
                locale.to_lowercase(),
                "--".into(),
                text.into(),
            ],
            Engine::SpdSay => vec![
                "-w".into(),
                "-r".into(),
                "-20".into(),
                "-l".into(),
                language.to_lowercase(),
                "--".into(),
                text.into(),
            ],
            Engine::Say => vec!["-r".into(), "140".into(), "--".into(), text.into()],
        }
    }

    /// Arguments that cancel queued and playing speech, for engines whose
    /// process exiting does not end the utterance.
    pub fn stop_args(&self) -> Option<&'static [&'static str]> {
        match self {
            Engine::SpdSay => Some(SPD_SAY_CANCEL),
            Engine::EspeakNg | Engine::Espeak | Engine::Say => None,
        }
    }
}

/// Speaks by spawning an installed command-line engine.
#[derive(Debug, Clone)]
pub struct CommandVoice {
    engine: Engine,
    program: PathBuf,
}

impl CommandVoice {
    pub fn new(engine: Engine, program: PathBuf) -> Self {
        Self { engine, program }
    }

    /// Searches `PATH` for a known engine.
    pub fn detect() -> Option<Self> {
        let path = env::var_os("PATH")?;
        Engine::SEARCH_ORDER.iter().find_map(|engine| {
            find_program(&engine.to_string(), env::split_paths(&path))
                .map(|program| Self::new(*engine, program))
        })
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }
}

fn find_program(name: &str, dirs: impl Iterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.map(|dir| dir.join(name)).find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl Voice for CommandVoice {
    fn start(&self, text: &str, locale: &str) -> io::Result<Box<dyn Playback>> {
        let child = Command::new(&self.program)
            .args(self.engine.args(text, locale))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let stop = self.engine.stop_args().map(|args| {
            let mut cmd = Command::new(&self.program);
            cmd.args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            cmd
        });
        Ok(Box::new(EnginePlayback { child, stop }))
    }
}

/// Busy/idle wrapper around a [`Voice`]: at most one utterance at a time,
/// playback errors end up as `speaking == false`.
pub struct Speech {
    voice: Option<Box<dyn Voice>>,
    current: Option<Box<dyn Playback>>,
    speaking: bool,
}

impl Speech {
    pub fn new(voice: Option<Box<dyn Voice>>) -> Self {
        Self {
            voice,
            current: None,
            speaking: false,
        }
    }

    pub fn detect() -> Self {
        match CommandVoice::detect() {
            Some(voice) => {
                info!("speech via {}", voice.engine());
                Self::new(Some(Box::new(voice)))
            }
            None => {
                info!("no speech engine found, audio disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.voice.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn speak(&mut self, text: &str, locale: &str) {
        let Some(voice) = self.voice.as_ref() else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }

        if let Some(mut playing) = self.current.take() {
            playing.cancel();
        }

        match voice.start(text, locale) {
            Ok(playback) => {
                debug!("speaking {:?} ({locale})", text);
                self.current = Some(playback);
                self.speaking = true;
            }
            Err(e) => {
                warn!("speech failed: {e}");
                self.speaking = false;
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut playing) = self.current.take() {
            playing.cancel();
        }
        self.speaking = false;
    }

    /// Observes the end of the current utterance. Call once per loop turn.
    pub fn poll(&mut self) {
        let Some(playing) = self.current.as_mut() else {
            return;
        };
        match playing.is_finished() {
            Ok(false) => {}
            Ok(true) => {
                self.current = None;
                self.speaking = false;
            }
            Err(e) => {
                warn!("speech playback error: {e}");
                self.current = None;
                self.speaking = false;
            }
        }
    }
}

impl Drop for Speech {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        started: Vec<(String, String)>,
        cancelled: usize,
        finished: bool,
        poll_error: bool,
    }

    struct FakePlayback(Arc<Mutex<Log>>);

    impl Playback for FakePlayback {
        fn is_finished(&mut self) -> io::Result<bool> {
            let log = self.0.lock().unwrap();
            if log.poll_error {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            Ok(log.finished)
        }

        fn cancel(&mut self) {
            self.0.lock().unwrap().cancelled += 1;
        }
    }

    struct FakeVoice {
        log: Arc<Mutex<Log>>,
        fail: bool,
    }

    impl Voice for FakeVoice {
        fn start(&self, text: &str, locale: &str) -> io::Result<Box<dyn Playback>> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no engine"));
            }
            self.log
                .lock()
                .unwrap()
                .started
                .push((text.to_string(), locale.to_string()));
            Ok(Box::new(FakePlayback(Arc::clone(&self.log))))
        }
    }

    fn fake(fail: bool) -> (Speech, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let voice = FakeVoice {
            log: Arc::clone(&log),
            fail,
        };
        (Speech::new(Some(Box::new(voice))), log)
    }

    #[test]
    fn unsupported_speech_is_a_no_op() {
        let mut s = Speech::disabled();
        assert!(!s.is_supported());
        s.speak("hello", DEFAULT_LOCALE);
        assert!(!s.is_speaking());
    }

    #[test]
    fn empty_text_is_a_no_op() {
        let (mut s, log) = fake(false);
        s.speak("   ", DEFAULT_LOCALE);
        assert!(!s.is_speaking());
        assert!(log.lock().unwrap().started.is_empty());
    }

    #[test]
    fn speaking_flag_follows_playback() {
        let (mut s, log) = fake(false);
        s.speak("Wanderlust", "en-US");
        assert!(s.is_speaking());
        s.poll();
        assert!(s.is_speaking());

        log.lock().unwrap().finished = true;
        s.poll();
        assert!(!s.is_speaking());
        assert_eq!(
            log.lock().unwrap().started,
            vec![("Wanderlust".to_string(), "en-US".to_string())]
        );
    }

    #[test]
    fn new_utterance_cancels_previous() {
        let (mut s, log) = fake(false);
        s.speak("one", DEFAULT_LOCALE);
        s.speak("two", DEFAULT_LOCALE);
        let log = log.lock().unwrap();
        assert_eq!(log.cancelled, 1);
        assert_eq!(log.started.len(), 2);
        drop(log);
        assert!(s.is_speaking());
    }

    #[test]
    fn stop_cancels_and_clears_flag() {
        let (mut s, log) = fake(false);
        s.speak("Luminous", DEFAULT_LOCALE);
        s.stop();
        assert!(!s.is_speaking());
        assert_eq!(log.lock().unwrap().cancelled, 1);
        s.stop();
        assert_eq!(log.lock().unwrap().cancelled, 1);
    }

    #[test]
    fn start_errors_are_swallowed() {
        let (mut s, _log) = fake(true);
        s.speak("Eloquent", DEFAULT_LOCALE);
        assert!(s.is_supported());
        assert!(!s.is_speaking());
    }

    #[test]
    fn playback_errors_end_speaking() {
        let (mut s, log) = fake(false);
        s.speak("Resilient", DEFAULT_LOCALE);
        log.lock().unwrap().poll_error = true;
        s.poll();
        assert!(!s.is_speaking());
    }

    #[test]
    fn engine_arguments() {
        assert_eq!(
            Engine::EspeakNg.args("hi", "en-US"),
            vec!["-s", "140", "-v", "en-us", "--", "hi"]
        );
        assert_eq!(
            Engine::SpdSay.args("hi", "tr_TR"),
            vec!["-w", "-r", "-20", "-l", "tr", "--", "hi"]
        );
        assert_eq!(Engine::Say.args("hi", "en-US"), vec!["-r", "140", "--", "hi"]);
        assert_eq!(Engine::EspeakNg.to_string(), "espeak-ng");
    }

    #[test]
    fn only_daemon_engines_need_a_stop_command() {
        assert_eq!(Engine::SpdSay.stop_args(), Some(&["-C"][..]));
        assert_eq!(Engine::EspeakNg.stop_args(), None);
        assert_eq!(Engine::Espeak.stop_args(), None);
        assert_eq!(Engine::Say.stop_args(), None);
    }

    #[cfg(unix)]
    #[test]
    fn cancelling_spd_say_clears_the_daemon_queue() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("spd-say");
        let marker = dir.path().join("cancelled");
        std::fs::write(
            &bin,
            format!(
                "#!/bin/sh\nif [ \"$1\" = \"-C\" ]; then touch '{}'; exit 0; fi\nsleep 5\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let voice = CommandVoice::new(Engine::SpdSay, bin);
        let mut playback = voice.start("hi", DEFAULT_LOCALE).unwrap();
        assert!(!playback.is_finished().unwrap());
        playback.cancel();

        assert!(playback.is_finished().unwrap());
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_on_the_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("espeak");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("say"), "not executable").unwrap();

        let dirs = || vec![dir.path().to_path_buf()].into_iter();
        assert_eq!(find_program("espeak", dirs()), Some(bin.clone()));
        assert_eq!(find_program("say", dirs()), None);
        assert_eq!(find_program("spd-say", dirs()), None);
    }
}
