// SPDX-License-Identifier: GPL-3.0-only

//! Parsing of `lvm fullreport` output.
//!
//! The report is requested as JSON with byte units and no suffixes. Every row
//! is an object keyed by column name with string values, so column order and
//! additional columns do not matter. A missing or malformed column fails the
//! whole parse; rows are never skipped.

use std::collections::HashMap;

use lvmd_types::{AttrError, LogicalVolumeInfo, LvAttr, VolumeGroupInfo};
use serde::Deserialize;
use thiserror::Error;

const VG_COLUMNS: &[&str] = &["vg_name", "vg_uuid", "vg_size", "vg_free"];

const LV_COLUMNS: &[&str] = &[
    "lv_uuid",
    "lv_name",
    "lv_full_name",
    "lv_path",
    "lv_size",
    "lv_kernel_major",
    "lv_kernel_minor",
    "origin",
    "origin_size",
    "pool_lv",
    "lv_tags",
    "lv_attr",
    "vg_name",
    "data_percent",
    "metadata_percent",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed report document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("column {column} missing from {row} row")]
    MissingColumn { row: &'static str, column: &'static str },

    #[error("column {column} has invalid value {value:?}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("logical volume {name} has invalid lv_attr")]
    InvalidAttr {
        name: String,
        #[source]
        source: AttrError,
    },

    #[error("report section lists logical volumes but no volume group")]
    MissingVolumeGroup,

    #[error("report section lists {count} volume groups, expected one")]
    MultipleVolumeGroups { count: usize },

    #[error("logical volume {volume} reports volume group {reported}, expected {expected}")]
    VolumeGroupMismatch {
        volume: String,
        reported: String,
        expected: String,
    },
}

/// One volume group and the logical volumes it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub volume_group: VolumeGroupInfo,
    pub volumes: Vec<LogicalVolumeInfo>,
}

/// Arguments of a `fullreport` over every volume group, or only over `scope`.
pub(crate) fn fullreport_args(scope: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = [
        "fullreport",
        "--reportformat",
        "json",
        "--units",
        "b",
        "--nosuffix",
        "--configreport",
        "vg",
        "-o",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();
    args.push(VG_COLUMNS.join(","));
    args.extend(["--configreport", "lv", "-o"].map(String::from));
    args.push(LV_COLUMNS.join(","));
    for empty in ["pv", "pvseg", "seg"] {
        args.extend(["--configreport", empty, "-o", ","].map(String::from));
    }
    if let Some(vg_name) = scope {
        args.push(vg_name.to_string());
    }
    args
}

type Row = HashMap<String, String>;

#[derive(Debug, Deserialize)]
struct Document {
    report: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    vg: Vec<Row>,
    #[serde(default)]
    lv: Vec<Row>,
}

/// Parses the JSON `fullreport` output, one entry per volume group.
pub fn parse(output: &[u8]) -> Result<Vec<ReportEntry>, ReportError> {
    let document: Document = serde_json::from_slice(output)?;
    let mut entries = Vec::with_capacity(document.report.len());
    for section in document.report {
        let volume_group = match section.vg.as_slice() {
            [] if section.lv.is_empty() => continue,
            [] => return Err(ReportError::MissingVolumeGroup),
            [row] => parse_volume_group(row)?,
            rows => return Err(ReportError::MultipleVolumeGroups { count: rows.len() }),
        };

        let volumes = section
            .lv
            .iter()
            .map(parse_logical_volume)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(stray) = volumes.iter().find(|lv| lv.vg_name != volume_group.name) {
            return Err(ReportError::VolumeGroupMismatch {
                volume: stray.name.clone(),
                reported: stray.vg_name.clone(),
                expected: volume_group.name.clone(),
            });
        }

        entries.push(ReportEntry {
            volume_group,
            volumes,
        });
    }
    Ok(entries)
}

struct Columns<'a> {
    row: &'a Row,
    kind: &'static str,
}

impl<'a> Columns<'a> {
    fn text(&self, column: &'static str) -> Result<&'a str, ReportError> {
        self.row
            .get(column)
            .map(|value| value.trim())
            .ok_or(ReportError::MissingColumn {
                row: self.kind,
                column,
            })
    }

    fn optional(&self, column: &'static str) -> Result<Option<&'a str>, ReportError> {
        self.text(column)
            .map(|value| (!value.is_empty()).then_some(value))
    }

    fn number<T: std::str::FromStr>(&self, column: &'static str) -> Result<T, ReportError> {
        let value = self.text(column)?;
        value.parse().map_err(|_| ReportError::InvalidNumber {
            column,
            value: value.to_string(),
        })
    }

    fn optional_number<T: std::str::FromStr>(
        &self,
        column: &'static str,
    ) -> Result<Option<T>, ReportError> {
        match self.optional(column)? {
            Some(_) => self.number(column).map(Some),
            None => Ok(None),
        }
    }

    /// Kernel device number; `-1` marks an inactive volume.
    fn device_number(&self, column: &'static str) -> Result<Option<u32>, ReportError> {
        let number: Option<i64> = self.optional_number(column)?;
        match number {
            None | Some(-1) => Ok(None),
            Some(value) => u32::try_from(value)
                .map(Some)
                .map_err(|_| ReportError::InvalidNumber {
                    column,
                    value: value.to_string(),
                }),
        }
    }
}

fn parse_volume_group(row: &Row) -> Result<VolumeGroupInfo, ReportError> {
    let columns = Columns { row, kind: "vg" };
    Ok(VolumeGroupInfo {
        name: columns.text("vg_name")?.to_string(),
        uuid: columns.text("vg_uuid")?.to_string(),
        size: columns.number("vg_size")?,
        free: columns.number("vg_free")?,
    })
}

fn parse_logical_volume(row: &Row) -> Result<LogicalVolumeInfo, ReportError> {
    let columns = Columns { row, kind: "lv" };
    let name = columns.text("lv_name")?.to_string();
    let attr = LvAttr::parse(columns.text("lv_attr")?).map_err(|source| {
        ReportError::InvalidAttr {
            name: name.clone(),
            source,
        }
    })?;
    let tags = columns
        .text("lv_tags")?
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    Ok(LogicalVolumeInfo {
        full_name: columns.text("lv_full_name")?.to_string(),
        vg_name: columns.text("vg_name")?.to_string(),
        uuid: columns.text("lv_uuid")?.to_string(),
        size: columns.number("lv_size")?,
        device_path: columns.text("lv_path")?.to_string(),
        attr,
        pool: columns.optional("pool_lv")?.map(str::to_string),
        origin: columns.optional("origin")?.map(str::to_string),
        origin_size: columns.optional_number("origin_size")?,
        tags,
        major: columns.device_number("lv_kernel_major")?,
        minor: columns.device_number("lv_kernel_minor")?,
        data_percent: columns.optional_number("data_percent")?,
        metadata_percent: columns.optional_number("metadata_percent")?,
        name,
    })
}
