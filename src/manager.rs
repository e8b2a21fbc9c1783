//! High-level light gun manager
//!
//! Wires the backends together and runs the three long-lived threads:
//! - `wiimote`: pumps the Bluetooth stack, runs aim processing, sends gun events
//! - `spot-generator`: the per-line pulse loop on the video hardware
//! - `executor`: applies gun events to the trigger outputs
//!
//! The input thread owns the only sender of the event channel, so the
//! executor drains every event (including the final release) before exiting.

use crate::backend::{RadioLink, TriggerOutputs, VideoHardware};
use crate::mapping::aim::{AimProcessor, GunEvent, PLAYERS};
use crate::mapping::calibration::CalibrationStore;
use crate::mapping::config::Config;
use crate::mapping::executor::TriggerExecutor;
use crate::video::{ReticleShared, SpotGenerator};
use crate::wiimote::{WiimoteId, WiimoteManager};
use anyhow::{bail, Context};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Manager for the Wiimote input, spot generator and trigger outputs
pub struct GunManager<R, H, T>
where
    R: RadioLink + 'static,
    H: VideoHardware + 'static,
    T: TriggerOutputs + 'static,
{
    config: Config,
    radio: Option<R>,
    video: Option<H>,
    triggers: Option<T>,
    shared: Arc<ReticleShared>,
    /// Running flag
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl<R, H, T> GunManager<R, H, T>
where
    R: RadioLink + 'static,
    H: VideoHardware + 'static,
    T: TriggerOutputs + 'static,
{
    pub fn new(config: Config, radio: R, video: H, triggers: T) -> Self {
        Self {
            config,
            radio: Some(radio),
            video: Some(video),
            triggers: Some(triggers),
            shared: Arc::new(ReticleShared::new()),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// Start the manager. The backends move into their threads, so a manager
    /// can only be started once.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            bail!("Manager is already running");
        }
        let radio = self.radio.take().context("Radio already in use")?;
        let video = self.video.take().context("Video hardware already in use")?;
        let triggers = self.triggers.take().context("Trigger outputs already in use")?;

        self.running.store(true, Ordering::SeqCst);
        info!("Starting light gun manager...");

        let (sender, receiver) = bounded(100);
        self.start_executor_thread(triggers, receiver)?;
        self.start_generator_thread(video)?;
        self.start_input_thread(radio, sender)?;

        info!("✓ Manager started! Press 1+2 on the Wiimotes to connect");
        Ok(())
    }

    /// Stop the manager and wait for its threads
    pub fn stop(&mut self) {
        info!("Stopping light gun manager...");
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                warn!("Thread '{}' panicked", name);
            }
        }
    }

    /// Check if the manager is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Reticle state shared with the spot generator
    pub fn shared(&self) -> &Arc<ReticleShared> {
        &self.shared
    }

    fn start_executor_thread(&mut self, triggers: T, receiver: Receiver<GunEvent>) -> anyhow::Result<()> {
        let handle = thread::Builder::new()
            .name("executor".to_string())
            .spawn(move || {
                info!("Executor thread started");
                let mut executor = TriggerExecutor::new(triggers);

                loop {
                    match receiver.recv_timeout(Duration::from_millis(16)) {
                        Ok(event) => executor.process_event(&event),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("Event channel closed");
                            break;
                        }
                    }
                }

                executor.release_all();
                info!("Executor thread exited");
            })
            .context("Failed to spawn executor thread")?;
        self.threads.push(handle);
        Ok(())
    }

    fn start_generator_thread(&mut self, video: H) -> anyhow::Result<()> {
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let video_config = self.config.video.clone();

        let handle = thread::Builder::new()
            .name("spot-generator".to_string())
            .spawn(move || {
                let mut generator = SpotGenerator::new(video, &video_config, shared);
                generator.run(&running);
            })
            .context("Failed to spawn spot generator thread")?;
        self.threads.push(handle);
        Ok(())
    }

    fn start_input_thread(&mut self, radio: R, sender: Sender<GunEvent>) -> anyhow::Result<()> {
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let settings = self.config.settings.clone();
        let video_config = self.config.video.clone();

        let handle = thread::Builder::new()
            .name("wiimote".to_string())
            .spawn(move || {
                info!("Wiimote thread started");
                let store = CalibrationStore::load(&settings.calibration_file);
                let mut aim = AimProcessor::new(&settings, &video_config, Arc::clone(&shared), store);
                let mut wiimotes = WiimoteManager::new(radio);

                let mut players: [Option<WiimoteId>; PLAYERS] = [None; PLAYERS];
                for slot in players.iter_mut() {
                    *slot = wiimotes.create_wiimote();
                }
                let mut connected = [false; PLAYERS];
                let poll_interval = Duration::from_millis(settings.poll_interval_ms);

                while running.load(Ordering::SeqCst) {
                    wiimotes.tick();
                    shared.set_splash(settings.show_splash && !wiimotes.any_connected());

                    for (player, slot) in players.iter_mut().enumerate() {
                        let Some(id) = *slot else { continue };
                        let now = wiimotes.is_connected(id);
                        if now {
                            if let Some(data) = wiimotes.data(id).copied() {
                                if let Some(leds) = aim.update(player, &data) {
                                    wiimotes.set_player_leds(id, leds);
                                }
                            }
                        } else if connected[player] {
                            warn!("Wiimote {} lost, waiting for it to reconnect", player + 1);
                            aim.disconnect(player);
                            wiimotes.close(id);
                            *slot = wiimotes.create_wiimote();
                        }
                        connected[player] = now;
                    }

                    for event in aim.trigger_events() {
                        if sender.send(event).is_err() {
                            warn!("Executor is gone, dropping {:?}", event);
                        }
                    }

                    thread::sleep(poll_interval);
                }

                let _ = sender.send(GunEvent::ReleaseAll);
                info!("Wiimote thread exited");
            })
            .context("Failed to spawn Wiimote thread")?;
        self.threads.push(handle);
        Ok(())
    }
}

impl<R, H, T> Drop for GunManager<R, H, T>
where
    R: RadioLink + 'static,
    H: VideoHardware + 'static,
    T: TriggerOutputs + 'static,
{
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            info!("Shutting down light gun manager (Drop trait)...");
            self.stop();
            info!("✓ Light gun manager shutdown complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockTriggers, MockVideo, SimWiimote};

    #[test]
    fn second_start_is_rejected() {
        let mut config = Config::default();
        config.settings.calibration_file = std::env::temp_dir()
            .join("wiigun-manager-unused.json")
            .to_string_lossy()
            .into_owned();
        let mut manager = GunManager::new(config, SimWiimote::new(), MockVideo::pal(), MockTriggers::new());
        manager.start().unwrap();
        assert!(manager.is_running());
        assert!(manager.start().is_err());
        manager.stop();
        assert!(!manager.is_running());
        // Backends were consumed by the first start
        assert!(manager.start().is_err());
    }
}
