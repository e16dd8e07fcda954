//! Expected I2C traffic shared by the mock-bus tests.

#![allow(dead_code)]

use embedded_hal_mock::eh1::i2c::Transaction as I2cTrans;

pub const ADDR: u8 = 0x28;

/// Index of the exit burst in [`write_sequence`].
pub const WRITE_EXIT_AT: usize = 53;

pub fn w(bytes: &[u8]) -> I2cTrans {
    I2cTrans::write(ADDR, bytes.to_vec())
}

pub fn ready() -> I2cTrans {
    I2cTrans::write_read(ADDR, vec![0x96], vec![0x00])
}

pub fn busy() -> I2cTrans {
    I2cTrans::write_read(ADDR, vec![0x96], vec![0xD0])
}

pub fn enter_test_mode() -> Vec<I2cTrans> {
    vec![w(&[0x95, 0x47]), w(&[0x96, 0x00]), w(&[0x96, 0xC0])]
}

pub fn exit_test_mode() -> Vec<I2cTrans> {
    vec![w(&[0x96, 0x40, 0x00]), w(&[0x95, 0x00])]
}

/// Opcode setup for a sector read, up to (not including) the first status read.
pub fn read_sector_setup(sector: u8) -> Vec<I2cTrans> {
    vec![w(&[0x96, 0xC0]), w(&[0x97, 0x00]), w(&[0x96, 0xD0 | sector])]
}

pub fn read_sequence(image: &[u8; 40]) -> Vec<I2cTrans> {
    let mut seq = enter_test_mode();
    for sector in 0..5u8 {
        let start = sector as usize * 8;
        seq.extend(read_sector_setup(sector));
        seq.push(ready());
        seq.push(I2cTrans::write_read(
            ADDR,
            vec![0x53],
            image[start..start + 8].to_vec(),
        ));
    }
    seq.extend(exit_test_mode());
    seq
}

pub fn write_sequence(image: &[u8; 40]) -> Vec<I2cTrans> {
    let mut seq = enter_test_mode();
    seq.push(w(&[0x53, 0x00]));
    // WRITE_SER with all five sectors, soft program, erase
    for ctrl1 in [0xFA, 0x07, 0x05] {
        seq.push(w(&[0x97, ctrl1]));
        seq.push(w(&[0x96, 0xD0]));
        seq.push(ready());
    }
    for sector in 0..5u8 {
        let start = sector as usize * 8;
        let mut load = vec![0x53];
        load.extend_from_slice(&image[start..start + 8]);
        seq.push(I2cTrans::write(ADDR, load));
        seq.push(w(&[0x96, 0xC0]));
        seq.push(w(&[0x97, 0x01]));
        seq.push(w(&[0x96, 0xD0]));
        seq.push(ready());
        seq.push(w(&[0x97, 0x06]));
        seq.push(w(&[0x96, 0xD0 | sector]));
        seq.push(ready());
    }
    seq.extend(exit_test_mode());
    seq
}

/// `seq` cut after `fail_at`, with that transaction failing.
pub fn failing_at(mut seq: Vec<I2cTrans>, fail_at: usize) -> Vec<I2cTrans> {
    seq.truncate(fail_at + 1);
    let failing = seq
        .pop()
        .expect("fail_at within sequence")
        .with_error(embedded_hal::i2c::ErrorKind::Other);
    seq.push(failing);
    seq
}
