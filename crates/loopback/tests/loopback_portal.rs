use std::time::Duration;

use loopback::{loopback_portal, LoopbackError};
use portal::factory::property;
use portal::{
    Attributes, ErrorCode, FileId, Message, Name, PortalConfig, PortalFactory, Properties, Timeout,
};

fn name(text: &str) -> Name {
    Name::new(text).unwrap()
}

#[test]
fn interest_round_trip_through_portal() {
    let factory = PortalFactory::new(None, Properties::new());
    let portal = loopback_portal(&factory).unwrap();
    let prefix = name("/lci/demo");
    let interest = Message::interest(prefix.child("item-0").unwrap());

    portal.start().unwrap();
    portal.listen(&prefix, Timeout::Never).unwrap();
    portal.send(&interest, Timeout::Never).unwrap();

    assert_eq!(portal.receive(Timeout::from_millis(500)).unwrap(), interest);
    assert_eq!(portal.file_id(), FileId::NOT_APPLICABLE);

    portal.stop().unwrap();
    portal.release();
}

#[test]
fn errors_surface_through_portal_error_code() {
    let factory = PortalFactory::new(None, Properties::new());
    let portal = loopback_portal(&factory).unwrap();

    let err = portal.receive(Timeout::IMMEDIATE).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NOT_CONNECTED);

    portal.start().unwrap();
    let err = portal.ignore(&name("/never"), Timeout::Never).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NOT_FOUND);
    assert_eq!(portal.error_code(), ErrorCode::NOT_FOUND);
}

#[test]
fn attributes_are_kept_by_the_portal() {
    let factory = PortalFactory::new(None, Properties::new());
    let portal = loopback_portal(&factory).unwrap();
    let attributes = Attributes::default().with_logging(true);

    portal.set_attributes(attributes.clone()).unwrap();
    assert_eq!(*portal.attributes(), attributes);
}

#[test]
fn configured_capacity_bounds_the_queue() {
    let config = PortalConfig::from_toml_str(
        r#"
        [properties]
        "portal.loopback.queue_capacity" = "2"
        "#,
    )
    .unwrap();
    let portal = loopback_portal(&PortalFactory::from_config(config)).unwrap();
    let message = Message::control(&b"tick"[..]);
    portal.start().unwrap();

    portal.send(&message, Timeout::IMMEDIATE).unwrap();
    portal.send(&message, Timeout::IMMEDIATE).unwrap();
    let err = portal.send(&message, Timeout::from_millis(10)).unwrap_err();
    assert!(err.is_timeout());

    portal.receive(Timeout::IMMEDIATE).unwrap();
    portal.send(&message, Timeout::IMMEDIATE).unwrap();
}

#[test]
fn blocked_sender_resumes_when_receiver_drains() {
    let props = Properties::new().with(property::LOOPBACK_QUEUE_CAPACITY, "1");
    let portal = loopback_portal(&PortalFactory::new(None, props)).unwrap();
    portal.start().unwrap();
    let first = Message::control(&b"1"[..]);
    let second = Message::control(&b"2"[..]);
    portal.send(&first, Timeout::Never).unwrap();

    std::thread::scope(|s| {
        let sender = s.spawn(|| portal.send(&second, Timeout::Never));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(portal.receive(Timeout::Never).unwrap(), first);
        sender.join().unwrap().unwrap();
    });

    assert_eq!(portal.receive(Timeout::IMMEDIATE).unwrap(), second);
}

#[test]
fn invalid_capacity_creates_no_portal() {
    let props = Properties::new().with(property::LOOPBACK_QUEUE_CAPACITY, "lots");
    let err = loopback_portal(&PortalFactory::new(None, props)).unwrap_err();
    assert!(matches!(
        err,
        LoopbackError::InvalidProperty { ref value, .. } if value == "lots"
    ));
}
