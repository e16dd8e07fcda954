mod common;

use common::*;
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use stusb4500_nvm::data_types::{Config, DEFAULT_POLL_ATTEMPTS, Pdo, PollLimit};
use stusb4500_nvm::nvm::NvmSession;
use stusb4500_nvm::{Error, FACTORY_DEFAULTS, Stusb4500};

#[test]
fn new_reads_all_sectors() {
    let expectations = read_sequence(&FACTORY_DEFAULTS);
    let mock = I2cMock::new(&expectations);
    let driver = Stusb4500::new(mock).unwrap();
    assert!(driver.is_factory_defaults());
    assert_eq!(driver.address(), ADDR);
    assert_eq!(driver.voltage_mv(Pdo::Pdo2), 15_000);
    driver.free().done();
}

#[test]
fn custom_address_is_used_on_the_bus() {
    let expectations = [I2cTrans::write(0x29, vec![0x95, 0x47]).with_error(ErrorKind::Other)];
    let mut mock = I2cMock::new(&expectations);
    let result = Stusb4500::with_address(mock.clone(), 0x29);
    assert!(matches!(result, Err(Error::I2c(ErrorKind::Other))));
    mock.done();
}

#[test]
fn busy_poll_repeats_until_request_clears() {
    let mut expectations = enter_test_mode();
    let zeros = [0u8; 40];
    let mut rest = read_sequence(&zeros).split_off(3);
    // sector 0: controller busy twice before finishing
    let mut sector0: Vec<I2cTrans> = rest.drain(..3).collect();
    sector0.push(busy());
    sector0.push(busy());
    expectations.extend(sector0);
    expectations.extend(rest);

    let mock = I2cMock::new(&expectations);
    let driver = Stusb4500::new(mock).unwrap();
    assert_eq!(driver.image().as_bytes(), &zeros);
    driver.free().done();
}

#[test]
fn poll_limit_turns_stuck_controller_into_timeout() {
    let mut expectations = enter_test_mode();
    expectations.extend(read_sector_setup(0));
    expectations.push(busy());
    expectations.push(busy());
    expectations.push(busy());

    let mut mock = I2cMock::new(&expectations);
    let config = Config::default().with_poll_limit(PollLimit::Attempts(3));
    let result = Stusb4500::with_config(mock.clone(), config);
    assert!(matches!(result, Err(Error::Timeout)));
    mock.done();
}

#[test]
fn single_attempt_budget_gives_up_where_unbounded_waits() {
    let mut expectations = enter_test_mode();
    expectations.extend(read_sector_setup(0));
    expectations.push(busy());

    let mut mock = I2cMock::new(&expectations);
    let config = Config::default().with_poll_limit(PollLimit::Attempts(1));
    let result = Stusb4500::with_config(mock.clone(), config);
    assert!(matches!(result, Err(Error::Timeout)));
    mock.done();

    let mut expectations = enter_test_mode();
    let mut rest = read_sequence(&FACTORY_DEFAULTS).split_off(3);
    let mut sector0: Vec<I2cTrans> = rest.drain(..3).collect();
    sector0.push(busy());
    sector0.push(busy());
    expectations.extend(sector0);
    expectations.extend(rest);

    let mock = I2cMock::new(&expectations);
    let config = Config::default().with_poll_limit(PollLimit::Unbounded);
    let driver = Stusb4500::with_config(mock, config).unwrap();
    assert!(driver.is_factory_defaults());
    driver.free().done();
}

#[test]
fn unbounded_poll_outlasts_default_budget() {
    let busy_reads = DEFAULT_POLL_ATTEMPTS as usize + 1;
    let mut expectations = enter_test_mode();
    let mut rest = read_sequence(&FACTORY_DEFAULTS).split_off(3);
    let sector0: Vec<I2cTrans> = rest.drain(..3).collect();
    expectations.extend(sector0);
    expectations.extend((0..busy_reads).map(|_| busy()));
    expectations.extend(rest);

    let mock = I2cMock::new(&expectations);
    let config = Config::default().with_poll_limit(PollLimit::Unbounded);
    let driver = Stusb4500::with_config(mock, config).unwrap();
    assert_eq!(driver.config().poll_limit, PollLimit::Unbounded);
    assert!(driver.is_factory_defaults());
    driver.free().done();
}

#[test]
fn set_poll_limit_applies_to_later_reads() {
    let mut expectations = read_sequence(&FACTORY_DEFAULTS);
    expectations.extend(enter_test_mode());
    expectations.extend(read_sector_setup(0));
    expectations.push(busy());

    let mock = I2cMock::new(&expectations);
    let mut driver = Stusb4500::new(mock).unwrap();
    assert_eq!(driver.config().poll_limit, PollLimit::default());

    driver.set_poll_limit(PollLimit::Attempts(1));
    assert_eq!(driver.config().poll_limit, PollLimit::Attempts(1));
    assert!(matches!(driver.read_parameters(), Err(Error::Timeout)));
    assert!(driver.is_factory_defaults());
    driver.free().done();
}

#[test]
fn write_parameters_programs_mirror() {
    let mut expectations = read_sequence(&FACTORY_DEFAULTS);
    let mut modified = FACTORY_DEFAULTS;
    modified[33] = 45; // PDO2 = 9 V
    modified[28] = (modified[28] & 0xF0) | 11; // PDO2 = 3 A
    expectations.extend(write_sequence(&modified));

    let mock = I2cMock::new(&expectations);
    let mut driver = Stusb4500::new(mock).unwrap();
    driver.set_voltage_mv(Pdo::Pdo2, 9_000);
    driver.set_current_ma(Pdo::Pdo2, 3_000);
    assert!(!driver.is_factory_defaults());
    driver.write_parameters().unwrap();
    driver.free().done();
}

#[test]
fn write_defaults_adopts_factory_image() {
    let zeros = [0u8; 40];
    let mut expectations = read_sequence(&zeros);
    expectations.extend(write_sequence(&FACTORY_DEFAULTS));

    let mock = I2cMock::new(&expectations);
    let mut driver = Stusb4500::new(mock).unwrap();
    assert!(!driver.is_factory_defaults());
    driver.write_defaults().unwrap();
    assert!(driver.is_factory_defaults());
    driver.free().done();
}

#[test]
fn write_bytes_rejects_short_buffer_without_bus_traffic() {
    let expectations = read_sequence(&FACTORY_DEFAULTS);
    let mock = I2cMock::new(&expectations);
    let mut driver = Stusb4500::new(mock).unwrap();
    let result = driver.write_bytes(&FACTORY_DEFAULTS[..32]);
    assert!(matches!(result, Err(Error::InvalidBufferLength(32))));
    driver.free().done();
}

#[test]
fn failed_write_stops_the_sequence() {
    // password, erase load, sector 0 buffer load, sector 0 poll, sector 1 program
    // load, sector 4 WRITE_PL load, exit burst, password relock
    for fail_at in [0, 5, 13, 17, 27, 48, WRITE_EXIT_AT, WRITE_EXIT_AT + 1] {
        let mut expectations = read_sequence(&[0u8; 40]);
        expectations.extend(failing_at(write_sequence(&FACTORY_DEFAULTS), fail_at));

        let mock = I2cMock::new(&expectations);
        let mut driver = Stusb4500::new(mock).unwrap();
        let result = driver.write_defaults();
        assert!(
            matches!(result, Err(Error::I2c(ErrorKind::Other))),
            "fail_at = {fail_at}"
        );
        // the image is only adopted once the whole sequence went through
        assert!(!driver.is_factory_defaults(), "fail_at = {fail_at}");
        driver.free().done();
    }
}

#[test]
fn failed_read_keeps_previous_mirror() {
    let mut expectations = read_sequence(&FACTORY_DEFAULTS);
    expectations.push(w(&[0x95, 0x47]).with_error(ErrorKind::Other));

    let mock = I2cMock::new(&expectations);
    let mut driver = Stusb4500::new(mock).unwrap();
    assert!(driver.read_parameters().is_err());
    assert!(driver.is_factory_defaults());
    driver.free().done();
}

#[test]
fn session_tracks_test_mode() {
    let mut expectations = vec![w(&[0x95, 0x47]).with_error(ErrorKind::Other)];
    expectations.push(w(&[0x95, 0x47]));
    expectations.push(w(&[0x96, 0x00]).with_error(ErrorKind::Other));
    expectations.extend(exit_test_mode());
    expectations.extend(enter_test_mode());
    expectations.push(w(&[0x96, 0xC0]).with_error(ErrorKind::Other));
    let mut mock = I2cMock::new(&expectations);

    {
        let mut session = NvmSession::new(&mut mock, ADDR, PollLimit::default());
        // rejected password: still locked
        assert!(session.enter_test_mode().is_err());
        assert!(!session.in_test_mode());
        // unlocked, then the reset write fails
        assert!(session.enter_test_mode().is_err());
        assert!(session.in_test_mode());
        session.exit_test_mode().unwrap();
        assert!(!session.in_test_mode());
    }
    {
        // dropped mid-read while unlocked
        let mut session = NvmSession::new(&mut mock, ADDR, PollLimit::default());
        session.enter_test_mode().unwrap();
        let mut sector = [0u8; 8];
        assert!(session.read_sector(0, &mut sector).is_err());
        assert!(session.in_test_mode());
    }
    mock.done();
}
