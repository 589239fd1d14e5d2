//! Communicator node: bridges the Controller link to the operator session.

use dickerbot_protocol::{ConnectionCredentials, ControlCommand, Frame, SensorFrame};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::connection::{ConnectionManager, ConnectionState, Transition};
use crate::credentials::{provision, CredentialStore};
use crate::drive::DriveCommands;
use crate::gesture::ButtonTracker;
use crate::hal::{Button, Camera, LedEvent, Link, SessionEvent, SessionTransport, StatusLed, WifiRadio};
use crate::router::{decode_session_text, send_to_session, LinkChannel};
use crate::safety::enforce_safe_state;

/// Hardware collaborators of a Communicator.
pub struct CommunicatorIo {
    /// UART to the Controller.
    pub link: Box<dyn Link>,
    pub store: Box<dyn CredentialStore>,
    pub radio: Box<dyn WifiRadio>,
    pub session: Box<dyn SessionTransport>,
    pub camera: Box<dyn Camera>,
    pub button: Box<dyn Button>,
    pub led: Box<dyn StatusLed>,
}

/// Where a provisioning frame came from; the `RD` reply goes back there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Link,
    Session,
}

/// The Communicator poll loop state.
///
/// Each [`poll`](Self::poll) services, in order: the Controller link, the
/// provisioning button, WiFi association, session events and the camera.
pub struct CommunicatorNode {
    config: NodeConfig,
    link: LinkChannel<Box<dyn Link>>,
    store: Box<dyn CredentialStore>,
    radio: Box<dyn WifiRadio>,
    session: Box<dyn SessionTransport>,
    camera: Box<dyn Camera>,
    button: Box<dyn Button>,
    led: Box<dyn StatusLed>,
    connection: ConnectionManager,
    tracker: ButtonTracker,
    commands: DriveCommands,
    latest_sensors: Option<SensorFrame>,
    next_image_ms: u64,
}

impl CommunicatorNode {
    pub fn new(config: NodeConfig, io: CommunicatorIo) -> Self {
        Self {
            link: LinkChannel::new(io.link, "controller", config.link_buffer_capacity),
            store: io.store,
            radio: io.radio,
            session: io.session,
            camera: io.camera,
            button: io.button,
            led: io.led,
            connection: ConnectionManager::new(config.association),
            tracker: ButtonTracker::new(),
            commands: DriveCommands::neutral(),
            latest_sensors: None,
            next_image_ms: 0,
            config,
        }
    }

    pub fn begin(&mut self, now_ms: u64) {
        info!(device = %self.config.device_id, "Communicator starting");
        self.next_image_ms = now_ms;
        self.led.notify(LedEvent::Startup);
    }

    /// One loop iteration.
    pub fn poll(&mut self, now_ms: u64) {
        for frame in self.link.poll_frames() {
            self.handle_link_frame(frame);
        }

        if let Some(gesture) = self.tracker.sample(self.button.is_pressed(), now_ms) {
            debug!(?gesture, "Button released");
            let transition = self.connection.handle_gesture(
                gesture,
                now_ms,
                self.store.as_mut(),
                self.radio.as_mut(),
                self.session.as_mut(),
            );
            self.apply(transition);
        }

        let transition =
            self.connection
                .poll_association(now_ms, self.radio.as_mut(), self.session.as_mut());
        self.apply(transition);

        while let Some(event) = self.session.poll_event() {
            let transition = self.connection.handle_session_event(&event);
            self.apply(transition);
            if let SessionEvent::Text(text) = event {
                self.handle_session_text(&text);
            }
        }

        self.stream_image(now_ms);
    }

    /// Side effects of a state-machine transition.
    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::SessionDropped => {
                enforce_safe_state(&mut self.commands, &mut self.link);
                self.led.notify(LedEvent::Connecting);
            }
            Transition::AssociationStarted | Transition::AssociationRetry { .. } => {
                self.led.notify(LedEvent::Connecting);
            }
            Transition::SessionOpening | Transition::SessionUp => {
                self.led.notify(LedEvent::SessionUp);
            }
            Transition::AssociationFailed { .. }
            | Transition::NotProvisioned
            | Transition::CredentialsCleared
            | Transition::None => {}
        }
    }

    fn handle_link_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Sensor(sensors) => {
                self.latest_sensors = Some(sensors);
                if self.connection.is_connected() {
                    send_to_session(self.session.as_mut(), &Frame::Sensor(sensors));
                }
            }
            Frame::Wifi(credentials) => self.handle_provisioning(&credentials, Origin::Link),
            other => debug!(tag = %other.tag(), "Ignoring frame from controller"),
        }
    }

    fn handle_session_text(&mut self, text: &str) {
        let Some(frame) = decode_session_text(text) else {
            return;
        };
        match frame {
            Frame::Control(command) => self.handle_control(command),
            Frame::Wifi(credentials) => self.handle_provisioning(&credentials, Origin::Session),
            other => debug!(tag = %other.tag(), "Ignoring frame from session"),
        }
    }

    fn handle_control(&mut self, command: ControlCommand) {
        if !self.connection.is_connected() {
            debug!(?command, "Dropping control command outside a session");
            return;
        }
        self.commands.apply(command);
        self.link.send(&Frame::Control(command));
    }

    fn handle_provisioning(&mut self, credentials: &ConnectionCredentials, origin: Origin) {
        if let Err(e) = provision(self.store.as_mut(), credentials) {
            warn!("Rejecting provisioning data: {}", e);
            return;
        }
        info!(ssid = %credentials.ssid, ?origin, "Provisioned");

        let reply = Frame::Reply(self.config.device_id.clone());
        match origin {
            Origin::Link => self.link.send(&reply),
            Origin::Session => send_to_session(self.session.as_mut(), &reply),
        }
        self.led.notify(LedEvent::Provisioned);
    }

    fn stream_image(&mut self, now_ms: u64) {
        if !self.connection.is_connected() || now_ms < self.next_image_ms {
            return;
        }
        self.next_image_ms = now_ms + self.config.image_period_ms;
        match self.camera.capture_frame() {
            Some(jpeg) => send_to_session(self.session.as_mut(), &Frame::Image(jpeg)),
            None => debug!("Camera capture failed, skipping frame"),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Last commands forwarded to the Controller.
    pub fn commands(&self) -> &DriveCommands {
        &self.commands
    }

    pub fn latest_sensors(&self) -> Option<&SensorFrame> {
        self.latest_sensors.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeButton, FakeCamera, FakeLed, FakeLink, FakeRadio, FakeSession, SharedStore};
    use dickerbot_protocol::{Direction, Wheel};
    use pretty_assertions::assert_eq;

    struct Rig {
        node: CommunicatorNode,
        link: FakeLink,
        store: SharedStore,
        radio: FakeRadio,
        session: FakeSession,
        camera: FakeCamera,
        button: FakeButton,
        led: FakeLed,
    }

    fn creds() -> ConnectionCredentials {
        ConnectionCredentials::new("myssid", "mypass", "192.168.1.5", 8080)
    }

    fn rig(store: SharedStore, radio: FakeRadio) -> Rig {
        let link = FakeLink::new();
        let session = FakeSession::new();
        let camera = FakeCamera::default();
        let button = FakeButton::default();
        let led = FakeLed::default();
        let config = NodeConfig {
            device_id: "24:6F:28:AA:BB:CC".to_string(),
            ..NodeConfig::default()
        };
        let mut node = CommunicatorNode::new(
            config,
            CommunicatorIo {
                link: Box::new(link.clone()),
                store: Box::new(store.clone()),
                radio: Box::new(radio.clone()),
                session: Box::new(session.clone()),
                camera: Box::new(camera.clone()),
                button: Box::new(button.clone()),
                led: Box::new(led.clone()),
            },
        );
        node.begin(0);
        Rig {
            node,
            link,
            store,
            radio,
            session,
            camera,
            button,
            led,
        }
    }

    impl Rig {
        fn press(&mut self, at_ms: u64, held_ms: u64) {
            self.button.set(true);
            self.node.poll(at_ms);
            self.button.set(false);
            self.node.poll(at_ms + held_ms);
        }

        /// Short press at t=0, WiFi up on the first check, session confirmed.
        fn connect(&mut self) {
            self.press(0, 100);
            self.node.poll(600);
            self.session.push_event(SessionEvent::Connected);
            self.node.poll(610);
            assert_eq!(self.node.state(), ConnectionState::Connected);
        }
    }

    #[test]
    fn test_short_press_connects() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.connect();

        assert_eq!(rig.radio.begins(), vec![("myssid".to_string(), "mypass".to_string())]);
        assert_eq!(rig.session.opened(), vec![("192.168.1.5".to_string(), 8080)]);
        assert_eq!(
            rig.led.events(),
            vec![
                LedEvent::Startup,
                LedEvent::Connecting,
                LedEvent::SessionUp,
                LedEvent::SessionUp
            ]
        );
    }

    #[test]
    fn test_mid_length_press_does_nothing() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.press(0, 2_000);
        assert_eq!(rig.node.state(), ConnectionState::Idle);
        assert!(rig.radio.begins().is_empty());
        assert!(rig.store.current().is_some());
    }

    #[test]
    fn test_long_press_clears_store() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.press(0, 3_001);
        assert_eq!(rig.store.current(), None);
    }

    #[test]
    fn test_sensor_relay_only_when_connected() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.link.inject(b"SD,1,2,3,0.1,0.2,0.3,25.5,10,20,30,40;");
        rig.node.poll(0);
        assert_eq!(rig.node.latest_sensors().map(|s| s.d_back), Some(40));
        assert!(rig.session.take_sent().is_empty());

        rig.connect();
        rig.link.inject(b"SD,1,2,3,0.1,0.2,0.3,25.5,10,20,30,40;");
        rig.node.poll(700);
        assert!(rig
            .session
            .take_sent()
            .contains(&"SD,1,2,3,0.1,0.2,0.3,25.5,10,20,30,40;".to_string()));
    }

    #[test]
    fn test_control_from_session_is_forwarded() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.connect();
        rig.link.take_written();

        rig.session.push_text("CD,0,128,1;");
        rig.node.poll(700);

        assert_eq!(rig.link.take_written(), "CD,0,128,1;");
        assert_eq!(
            rig.node.commands().get(Wheel::Left),
            &ControlCommand::new(Wheel::Left, 128, Direction::Forward)
        );
    }

    #[test]
    fn test_control_ignored_without_session() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.session.push_text("CD,0,128,1;");
        rig.node.poll(0);
        assert_eq!(rig.link.take_written(), "");
        assert!(rig.node.commands().is_safe());
    }

    #[test]
    fn test_session_drop_enforces_safe_state_first() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.connect();
        rig.session.push_text("CD,0,200,1");
        rig.session.push_text("CD,1,200,2");
        rig.node.poll(700);
        rig.link.take_written();

        rig.session.push_event(SessionEvent::Disconnected);
        rig.session.push_text("CD,0,50,1");
        rig.node.poll(800);

        assert_eq!(rig.node.state(), ConnectionState::Disconnected);
        assert_eq!(rig.link.take_written(), "CD,0,0,0;CD,1,0,0;");
        assert!(rig.node.commands().is_safe());
        assert_eq!(rig.led.events().last(), Some(&LedEvent::Connecting));
    }

    #[test]
    fn test_reconnect_does_not_reapply_safe_state() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.connect();
        rig.session.push_event(SessionEvent::Disconnected);
        rig.node.poll(700);
        rig.link.take_written();

        rig.session.push_event(SessionEvent::Connected);
        rig.node.poll(3_700);
        assert_eq!(rig.node.state(), ConnectionState::Connected);
        assert_eq!(rig.link.take_written(), "");
    }

    #[test]
    fn test_provisioning_over_link_replies_once() {
        let mut rig = rig(SharedStore::default(), FakeRadio::never());
        rig.link.inject(b"WD,myssid,mypass,192.168.1.5,8080;");
        rig.node.poll(0);

        assert_eq!(rig.store.current(), Some(creds()));
        assert_eq!(rig.link.take_written(), "RD,24:6F:28:AA:BB:CC;");
        assert!(rig.session.take_sent().is_empty());
        assert_eq!(rig.led.events().last(), Some(&LedEvent::Provisioned));
    }

    #[test]
    fn test_provisioning_over_session_replies_on_session() {
        let mut rig = rig(SharedStore::default(), FakeRadio::never());
        rig.session.push_text("WD,other,secret,10.0.0.2,9000");
        rig.node.poll(0);

        assert_eq!(
            rig.store.current(),
            Some(ConnectionCredentials::new("other", "secret", "10.0.0.2", 9000))
        );
        assert_eq!(rig.session.take_sent(), vec!["RD,24:6F:28:AA:BB:CC;".to_string()]);
        assert_eq!(rig.link.take_written(), "");
    }

    #[test]
    fn test_invalid_provisioning_keeps_prior_credentials() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::never());
        rig.link.inject(b"WD,,pass,10.0.0.2,9000;WD,a,b,c;WD,a,b,10.0.0.2,0;");
        rig.node.poll(0);

        assert_eq!(rig.store.current(), Some(creds()));
        assert_eq!(rig.link.take_written(), "");
    }

    #[test]
    fn test_images_follow_their_own_cadence() {
        let mut rig = rig(SharedStore::with(creds()), FakeRadio::after(1));
        rig.camera.queue(Some(vec![1, 2, 3]));
        rig.node.poll(0);
        // Not connected yet: nothing captured.
        assert!(rig.session.take_sent().is_empty());

        rig.connect();
        let sent = rig.session.take_sent();
        assert_eq!(sent, vec!["ID,AQID;".to_string()]);

        rig.camera.queue(None);
        rig.node.poll(810);
        assert!(rig.session.take_sent().is_empty());

        rig.camera.queue(Some(vec![0xff]));
        rig.node.poll(900);
        assert!(rig.session.take_sent().is_empty());
        rig.node.poll(1_010);
        assert_eq!(rig.session.take_sent(), vec!["ID,/w==;".to_string()]);
    }
}
