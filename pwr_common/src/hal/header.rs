//! Raspberry Pi 40-pin connector numbering.
//!
//! Maps header positions (`Board` addressing) to Broadcom lines (`Bcm`
//! addressing). Power and ground positions have no line.

use crate::hal::consts::{HEADER_PIN_COUNT, MAX_BCM_LINE};
use crate::hal::types::BoardMode;
use static_assertions::const_assert_eq;

/// Index = header position, value = Broadcom line. Index 0 is unused.
const HEADER: [Option<u8>; HEADER_PIN_COUNT + 1] = [
    None,     // 0 (unused)
    None,     // 1  3V3
    None,     // 2  5V
    Some(2),  // 3
    None,     // 4  5V
    Some(3),  // 5
    None,     // 6  GND
    Some(4),  // 7
    Some(14), // 8
    None,     // 9  GND
    Some(15), // 10
    Some(17), // 11
    Some(18), // 12
    Some(27), // 13
    None,     // 14 GND
    Some(22), // 15
    Some(23), // 16
    None,     // 17 3V3
    Some(24), // 18
    Some(10), // 19
    None,     // 20 GND
    Some(9),  // 21
    Some(25), // 22
    Some(11), // 23
    Some(8),  // 24
    None,     // 25 GND
    Some(7),  // 26
    Some(0),  // 27 ID_SD
    Some(1),  // 28 ID_SC
    Some(5),  // 29
    None,     // 30 GND
    Some(6),  // 31
    Some(12), // 32
    Some(13), // 33
    None,     // 34 GND
    Some(19), // 35
    Some(16), // 36
    Some(26), // 37
    Some(20), // 38
    None,     // 39 GND
    Some(21), // 40
];

const fn gpio_position_count() -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < HEADER.len() {
        if HEADER[i].is_some() {
            count += 1;
        }
        i += 1;
    }
    count
}

// Every Broadcom line 0..=27 appears exactly once on the header.
const_assert_eq!(gpio_position_count(), MAX_BCM_LINE as usize + 1);

/// Broadcom line for a header position, `None` for power/ground or out of range.
pub fn header_to_bcm(physical: u8) -> Option<u8> {
    HEADER.get(physical as usize).copied().flatten()
}

/// Translate `pin` from `mode` numbering into a Broadcom line.
pub fn to_bcm(mode: BoardMode, pin: u8) -> Option<u8> {
    match mode {
        BoardMode::Board => header_to_bcm(pin),
        BoardMode::Bcm => (pin <= MAX_BCM_LINE).then_some(pin),
    }
}
