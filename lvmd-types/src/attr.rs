// SPDX-License-Identifier: GPL-3.0-only

//! Decoding of the `lv_attr` report column.
//!
//! LVM emits one ten-character string per logical volume. Every position
//! carries a distinct trait (see `lvs(8)`, "lv_attr bits"):
//!
//! | pos | meaning                |
//! |-----|------------------------|
//! | 0   | volume type            |
//! | 1   | permissions            |
//! | 2   | allocation policy      |
//! | 3   | fixed minor            |
//! | 4   | state                  |
//! | 5   | device open            |
//! | 6   | target type            |
//! | 7   | zero before use        |
//! | 8   | volume health          |
//! | 9   | skip activation        |
//!
//! Each position is decoded into an explicit enum so that a character the
//! tool starts reporting in a later release is rejected instead of being
//! sorted into the wrong bucket.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the `lv_attr` string as reported by LVM2.
pub const LV_ATTR_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttrError {
    #[error("lv_attr {attr:?} has {len} characters, expected {}", LV_ATTR_LEN)]
    InvalidLength { attr: String, len: usize },

    #[error("lv_attr {attr:?}: unknown {field} flag {flag:?} at position {position}")]
    UnknownFlag {
        attr: String,
        field: &'static str,
        position: usize,
        flag: char,
    },
}

/// Declares a char-backed flag enum with a fallible decoder and an encoder.
macro_rules! attr_flag {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $ch:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const FIELD: &'static str = $field;

            pub fn from_char(flag: char) -> Option<Self> {
                match flag {
                    $( $ch => Some(Self::$variant), )+
                    _ => None,
                }
            }

            pub fn as_char(self) -> char {
                match self {
                    $( Self::$variant => $ch, )+
                }
            }
        }

        impl From<$name> for char {
            fn from(value: $name) -> char {
                value.as_char()
            }
        }
    };
}

attr_flag! {
    /// Position 0: the kind of logical volume.
    VolumeType, "volume type" {
        Cached = 'C',
        Mirrored = 'm',
        MirroredNoInitialSync = 'M',
        Origin = 'o',
        OriginWithMergingSnapshot = 'O',
        Raid = 'r',
        RaidNoInitialSync = 'R',
        Snapshot = 's',
        MergingSnapshot = 'S',
        PvMove = 'p',
        Virtual = 'v',
        MirrorOrRaidImage = 'i',
        MirrorOrRaidImageOutOfSync = 'I',
        MirrorLogDevice = 'l',
        UnderConversion = 'c',
        ThinVolume = 'V',
        ThinPool = 't',
        ThinPoolData = 'T',
        VdoPool = 'd',
        VdoPoolData = 'D',
        /// Raid or pool metadata, or the pool metadata spare.
        Metadata = 'e',
        /// Plain linear or striped volume.
        Default = '-',
    }
}

attr_flag! {
    /// Position 1.
    Permissions, "permissions" {
        Writeable = 'w',
        ReadOnly = 'r',
        ReadOnlyActivationOfNonReadOnlyVolume = 'R',
        Unknown = '-',
    }
}

attr_flag! {
    /// Position 2. Upper-case letters mark the policy as locked, which is
    /// tracked separately in [`LvAttr::allocation_locked`].
    AllocationPolicy, "allocation policy" {
        Anywhere = 'a',
        Contiguous = 'c',
        Inherited = 'i',
        Cling = 'l',
        Normal = 'n',
        Unknown = '-',
    }
}

attr_flag! {
    /// Position 4.
    VolumeState, "state" {
        Active = 'a',
        Historical = 'h',
        Suspended = 's',
        InvalidSnapshot = 'I',
        InvalidSuspendedSnapshot = 'S',
        SnapshotMergeFailed = 'm',
        SuspendedSnapshotMergeFailed = 'M',
        MappedDevicePresentWithoutTables = 'd',
        MappedDevicePresentWithInactiveTables = 'i',
        ThinPoolCheckNeeded = 'c',
        SuspendedThinPoolCheckNeeded = 'C',
        Unknown = 'X',
        Inactive = '-',
    }
}

attr_flag! {
    /// Position 5.
    OpenState, "device open" {
        Open = 'o',
        Unknown = 'X',
        Closed = '-',
    }
}

attr_flag! {
    /// Position 6: the kernel target the volume maps to.
    TargetType, "target type" {
        Cache = 'C',
        Mirror = 'm',
        Raid = 'r',
        Snapshot = 's',
        Thin = 't',
        Unknown = 'u',
        Virtual = 'v',
        Vdo = 'd',
        Plain = '-',
    }
}

attr_flag! {
    /// Position 8.
    VolumeHealth, "health" {
        Partial = 'p',
        RefreshNeeded = 'r',
        Mismatches = 'm',
        WriteMostly = 'w',
        RemoveAfterReshape = 'R',
        Failed = 'F',
        OutOfDataSpace = 'D',
        MetadataReadOnly = 'M',
        WritecacheError = 'E',
        Unknown = 'X',
        Healthy = '-',
    }
}

/// Coarse classification of [`VolumeType`] used for provisioning decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeClass {
    ThinPool,
    ThinVolume,
    /// Volume with a cache or writecache overlay.
    Cached,
    /// Linear, striped, mirrored, raid, snapshot and every internal sub-volume.
    Ordinary,
}

impl VolumeType {
    pub fn class(self) -> VolumeClass {
        match self {
            Self::ThinPool => VolumeClass::ThinPool,
            Self::ThinVolume => VolumeClass::ThinVolume,
            Self::Cached => VolumeClass::Cached,
            Self::Mirrored
            | Self::MirroredNoInitialSync
            | Self::Origin
            | Self::OriginWithMergingSnapshot
            | Self::Raid
            | Self::RaidNoInitialSync
            | Self::Snapshot
            | Self::MergingSnapshot
            | Self::PvMove
            | Self::Virtual
            | Self::MirrorOrRaidImage
            | Self::MirrorOrRaidImageOutOfSync
            | Self::MirrorLogDevice
            | Self::UnderConversion
            | Self::ThinPoolData
            | Self::VdoPool
            | Self::VdoPoolData
            | Self::Metadata
            | Self::Default => VolumeClass::Ordinary,
        }
    }
}

/// Fully decoded `lv_attr` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LvAttr {
    pub volume_type: VolumeType,
    pub permissions: Permissions,
    pub allocation_policy: AllocationPolicy,
    pub allocation_locked: bool,
    pub fixed_minor: bool,
    pub state: VolumeState,
    pub open: OpenState,
    pub target_type: TargetType,
    pub zero: bool,
    pub health: VolumeHealth,
    pub skip_activation: bool,
}

impl LvAttr {
    pub fn parse(attr: &str) -> Result<Self, AttrError> {
        let flags: Vec<char> = attr.chars().collect();
        if flags.len() != LV_ATTR_LEN {
            return Err(AttrError::InvalidLength {
                attr: attr.to_string(),
                len: flags.len(),
            });
        }

        let unknown = |field: &'static str, position: usize| AttrError::UnknownFlag {
            attr: attr.to_string(),
            field,
            position,
            flag: flags[position],
        };
        let switch = |field: &'static str, position: usize, on: char| match flags[position] {
            '-' => Ok(false),
            flag if flag == on => Ok(true),
            _ => Err(unknown(field, position)),
        };

        let volume_type =
            VolumeType::from_char(flags[0]).ok_or_else(|| unknown(VolumeType::FIELD, 0))?;
        let permissions =
            Permissions::from_char(flags[1]).ok_or_else(|| unknown(Permissions::FIELD, 1))?;
        let allocation_policy = AllocationPolicy::from_char(flags[2].to_ascii_lowercase())
            .ok_or_else(|| unknown(AllocationPolicy::FIELD, 2))?;
        let state = VolumeState::from_char(flags[4]).ok_or_else(|| unknown(VolumeState::FIELD, 4))?;
        let open = OpenState::from_char(flags[5]).ok_or_else(|| unknown(OpenState::FIELD, 5))?;
        let target_type =
            TargetType::from_char(flags[6]).ok_or_else(|| unknown(TargetType::FIELD, 6))?;
        let health =
            VolumeHealth::from_char(flags[8]).ok_or_else(|| unknown(VolumeHealth::FIELD, 8))?;

        Ok(Self {
            volume_type,
            permissions,
            allocation_policy,
            allocation_locked: flags[2].is_ascii_uppercase(),
            fixed_minor: switch("fixed minor", 3, 'm')?,
            state,
            open,
            target_type,
            zero: switch("zero", 7, 'z')?,
            health,
            skip_activation: switch("skip activation", 9, 'k')?,
        })
    }

    pub fn class(&self) -> VolumeClass {
        self.volume_type.class()
    }

    /// Thin volume carved from a thin pool.
    ///
    /// Decided by the type flag only: a writecache volume reports its cache
    /// volume in `pool_lv`, so pool linkage says nothing about thinness.
    pub fn is_thin(&self) -> bool {
        self.volume_type == VolumeType::ThinVolume
    }

    pub fn is_thin_pool(&self) -> bool {
        self.volume_type == VolumeType::ThinPool
    }

    /// Volume with a cache or writecache overlay.
    pub fn is_cached(&self) -> bool {
        self.volume_type == VolumeType::Cached
    }

    pub fn is_active(&self) -> bool {
        self.state == VolumeState::Active
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self.permissions,
            Permissions::ReadOnly | Permissions::ReadOnlyActivationOfNonReadOnlyVolume
        )
    }
}

impl FromStr for LvAttr {
    type Err = AttrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LvAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allocation = if self.allocation_locked {
            self.allocation_policy.as_char().to_ascii_uppercase()
        } else {
            self.allocation_policy.as_char()
        };
        let switch = |on: bool, flag: char| if on { flag } else { '-' };
        write!(
            f,
            "{}{}{}{}{}{}{}{}{}{}",
            self.volume_type.as_char(),
            self.permissions.as_char(),
            allocation,
            switch(self.fixed_minor, 'm'),
            self.state.as_char(),
            self.open.as_char(),
            self.target_type.as_char(),
            switch(self.zero, 'z'),
            self.health.as_char(),
            switch(self.skip_activation, 'k'),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_linear_volume() {
        let attr = LvAttr::parse("-wi-a-----").unwrap();
        assert_eq!(attr.volume_type, VolumeType::Default);
        assert_eq!(attr.permissions, Permissions::Writeable);
        assert_eq!(attr.allocation_policy, AllocationPolicy::Inherited);
        assert!(!attr.allocation_locked);
        assert!(attr.is_active());
        assert_eq!(attr.class(), VolumeClass::Ordinary);
        assert!(!attr.is_thin());
        assert!(!attr.is_cached());
    }

    #[test]
    fn decodes_thin_pool_and_thin_volume() {
        let pool = LvAttr::parse("twi-aotz--").unwrap();
        assert!(pool.is_thin_pool());
        assert!(!pool.is_thin());
        assert_eq!(pool.open, OpenState::Open);
        assert_eq!(pool.target_type, TargetType::Thin);
        assert!(pool.zero);

        let thin = LvAttr::parse("Vwi-a-tz--").unwrap();
        assert!(thin.is_thin());
        assert_eq!(thin.class(), VolumeClass::ThinVolume);
    }

    #[test]
    fn writecache_volume_is_cached_not_thin() {
        let attr = LvAttr::parse("Cwi-a-C---").unwrap();
        assert_eq!(attr.volume_type.as_char(), 'C');
        assert!(attr.is_cached());
        assert!(!attr.is_thin());
        assert_eq!(attr.class(), VolumeClass::Cached);
        assert_eq!(attr.target_type, TargetType::Cache);
    }

    #[test]
    fn decodes_locked_allocation_and_trailing_switches() {
        let attr = LvAttr::parse("-rCma-----").unwrap();
        assert_eq!(attr.allocation_policy, AllocationPolicy::Contiguous);
        assert!(attr.allocation_locked);
        assert!(attr.fixed_minor);
        assert!(attr.is_read_only());

        let attr = LvAttr::parse("Vri---tz-k").unwrap();
        assert!(attr.skip_activation);
        assert_eq!(attr.state, VolumeState::Inactive);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            LvAttr::parse("-wi-a"),
            Err(AttrError::InvalidLength {
                attr: "-wi-a".to_string(),
                len: 5,
            })
        );
        assert!(LvAttr::parse("").is_err());
    }

    #[test]
    fn rejects_unknown_type_flag() {
        let err = LvAttr::parse("Zwi-a-----").unwrap_err();
        assert_eq!(
            err,
            AttrError::UnknownFlag {
                attr: "Zwi-a-----".to_string(),
                field: "volume type",
                position: 0,
                flag: 'Z',
            }
        );
    }

    #[test]
    fn rejects_unknown_switch_flag() {
        let err = LvAttr::parse("-wi-a--q--").unwrap_err();
        assert!(matches!(err, AttrError::UnknownFlag { position: 7, .. }));
    }

    #[test]
    fn display_restores_reported_string() {
        for raw in ["-wi-a-----", "twi-aotz--", "Cwi-a-C---", "-rCma-----", "Vri---tz-k"] {
            assert_eq!(LvAttr::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn every_type_flag_has_a_class() {
        for flag in "CmMoOrRsSpviIlcVtTdDe-".chars() {
            let volume_type = VolumeType::from_char(flag).unwrap();
            assert_eq!(volume_type.as_char(), flag);
            let _ = volume_type.class();
        }
    }
}
