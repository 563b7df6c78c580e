use chrono::Utc;
use passkey_domain_models::{AttestationMetadata, Device, DeviceState, MdsDeviceMetadata, Session, SessionStatus};

fn sample_device(state: DeviceState) -> Device {
    let now = Utc::now();
    Device {
        account_address: "0x1111111111111111111111111111111111111".to_string(),
        device_id: "dev-1".to_string(),
        device_name: "Mac".to_string(),
        device_type: "platform".to_string(),
        credential_id: "cred-1".to_string(),
        raw_id: "cmF3MQ==".to_string(),
        public_key_x: "0xaa".to_string(),
        public_key_y: "0xbb".to_string(),
        attestation_object: None,
        client_data_json: None,
        state,
        attestation_metadata: AttestationMetadata::default(),
        mds_metadata: MdsDeviceMetadata::default(),
        created_at: now,
        updated_at: now,
        last_used_at: None,
    }
}

#[test]
fn device_state_round_trips_through_json() {
    let device = sample_device(DeviceState::Pending {
        proposal_hash: "0xdead".to_string(),
        proposal_tx_hash: None,
    });
    let json = serde_json::to_string(&device).expect("serialize");
    let parsed: Device = serde_json::from_str(&json).expect("deserialize");
    assert!(!parsed.is_active());
    assert_eq!(parsed.state.proposal_hash(), Some("0xdead"));
}

#[test]
fn active_state_has_no_proposal_hash() {
    let device = sample_device(DeviceState::Active);
    assert!(device.is_active());
    assert_eq!(device.state.proposal_hash(), None);
}

#[test]
fn session_effective_status_derives_expiry_without_mutating_status() {
    let now = Utc::now();
    let session = Session {
        session_id: "s-1".to_string(),
        account_address: "0xaccount".to_string(),
        owner_address: "0xowner".to_string(),
        signature: "0xsig".to_string(),
        status: SessionStatus::Pending,
        device_data: None,
        created_at: now - chrono::Duration::minutes(11),
        completed_at: None,
        expires_at: now - chrono::Duration::minutes(1),
    };

    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.effective_status(now), SessionStatus::Expired);
}
