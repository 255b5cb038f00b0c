//! Fault code registry.
//!
//! Fault responses list active faults as two-hex-digit codes. The registry
//! below names every code the operator documents; the list is sparse, so
//! lookups go through a sorted table.

use serde::Serialize;
use std::fmt;

/// Documented fault codes, sorted by code.
const FAULT_REGISTRY: &[(u8, &str)] = &[
    (0, "FAL1"),
    (1, "FAL2"),
    (2, "FAL3"),
    (3, "FAL4"),
    (4, "ERR1"),
    (5, "ERR2"),
    (7, "ERR4"),
    (9, "ERR6"),
    (13, "ALE1"),
    (14, "ALE2"),
    (15, "ALE3"),
    (16, "ALE4"),
    (17, "ALE5"),
    (18, "ALE6"),
    (19, "ALE7_ELD"),
    (20, "ALE8_ELD"),
    (21, "ALE9_ELD"),
    (22, "AL10_ELD"),
    (23, "AL11_ELD"),
    (24, "AL12_ELD"),
    (25, "ALE7_IOLD"),
    (26, "ALE8_IOLD"),
    (27, "ALE9_IOLD"),
    (28, "AL10_IOLD"),
    (29, "AL11_IOLD"),
    (30, "AL12_IOLD"),
    (31, "ALE7_OOLD"),
    (32, "ALE8_OOLD"),
    (33, "ALE9_OOLD"),
    (34, "AL10_OOLD"),
    (35, "AL11_OOLD"),
    (36, "AL12_OOLD"),
    (37, "ALE7_SLD"),
    (38, "ALE8_SLD"),
    (39, "ALE9_SLD"),
    (40, "AL10_SLD"),
    (41, "AL11_SLD"),
    (42, "AL12_SLD"),
    (43, "AL13"),
    (44, "AL14"),
    (45, "AL15"),
    (58, "ERR3_ELD"),
    (59, "ERR3_IOLD"),
    (60, "ERR3_OOLD"),
    (61, "ERR3_SLD"),
    (66, "AL17"),
    (81, "ERR8"),
    (82, "ERR9"),
    (83, "AL18"),
    (143, "AL19"),
    (144, "FAL5_OPEN"),
    (145, "FAL5_CLOSE"),
    (146, "ER10_OPEN"),
    (147, "ER10_CLOSE"),
    (155, "AL20"),
    (166, "FAL14"),
    (167, "AL21"),
    (168, "ERR11"),
    (170, "AL22"),
    (171, "FAL7"),
    (172, "AL24"),
    (177, "ER12"),
    (180, "ER13"),
    (181, "FAL6"),
    (185, "FAL8"),
    (194, "FAL2_S1"),
    (195, "FAL2_S2"),
    (196, "FAL2_S3"),
    (202, "FAL2_S1_2"),
    (203, "FAL2_S2_2"),
    (204, "FAL2_S3_2"),
    (205, "ER14_ELD"),
    (206, "ER14_IOLD"),
    (207, "ER14_OOLD"),
    (208, "ER14_CLD"),
    (213, "AL26"),
    (215, "AL27"),
];

/// A single fault code reported by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FaultCode {
    pub code: u8,
}

impl FaultCode {
    pub fn new(code: u8) -> Self {
        Self { code }
    }

    /// Registry name, or `None` for undocumented codes.
    pub fn name(&self) -> Option<&'static str> {
        FAULT_REGISTRY
            .binary_search_by_key(&self.code, |(code, _)| *code)
            .ok()
            .map(|index| FAULT_REGISTRY[index].1)
    }

    pub fn is_known(&self) -> bool {
        self.name().is_some()
    }
}

impl From<u8> for FaultCode {
    fn from(code: u8) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#04x})", self.code),
            None => write!(f, "UNKNOWN ({:#04x})", self.code),
        }
    }
}
