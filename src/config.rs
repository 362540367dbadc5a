//! Equipment configuration
//!
//! Parameters use the key names of the readout equipment configuration section, so an
//! existing `equipment-cruemulator-*` block can be pasted as YAML:
//!
//! ```rust
//! use cru_emulator::EmulatorConfig;
//!
//! let config = EmulatorConfig::from_yaml_str(
//!     "numberOfLinks: 4\nfeeId: 0x502A\ncruBlockSize: 8192\nEmptyHbRatio: 0.25\n",
//! ).unwrap();
//! assert_eq!(config.number_of_links, 4);
//! assert_eq!(config.payload_size, 64 * 1024); // default
//! ```
//!
//! Every key is optional. Validation happens when the emulator is built, against the
//! size of the header layout in use.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::rdh::HeaderLayout;
use crate::timing::LHC_BC_RATE;
use crate::{EmulatorError, Result};

/// Largest accepted spacing between two frame starts, in bunch crossings.
pub const MAX_BC_STEP: u32 = u32::MAX;

/// Packets one frame may span: the pages counter is 16 bits wide.
pub const MAX_PACKETS_PER_FRAME: u64 = u16::MAX as u64 + 1;

/// CRU emulator equipment parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Number of links simulated; one page per link is produced each round
    #[serde(rename = "numberOfLinks")]
    pub number_of_links: u32,

    /// Front-End Electronics id written in every header
    #[serde(rename = "feeId")]
    pub fee_id: u16,

    /// Id of the first link; links are numbered `link_id..link_id + number_of_links`
    #[serde(rename = "linkId")]
    pub link_id: u8,

    /// Size of one packet (RDH + payload) in bytes
    #[serde(rename = "cruBlockSize")]
    pub cru_block_size: u32,

    /// Interval between two heartbeat triggers, in orbits
    #[serde(rename = "HBperiod")]
    pub hb_period: u32,

    /// Timeframe length, in orbits
    #[serde(rename = "TFperiod")]
    pub tf_period: u32,

    /// Fraction of empty heartbeat frames
    #[serde(rename = "EmptyHbRatio")]
    pub empty_hb_ratio: f64,

    /// Maximum payload per frame; actual size is uniform in `0..=payload_size`
    #[serde(rename = "PayloadSize")]
    pub payload_size: u32,

    /// Input data rate of one link, in Gbit/s (GBT: 3.2 or 4.8)
    #[serde(rename = "gbtLinkThroughput")]
    pub gbt_link_throughput: f64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            number_of_links: 1,
            fee_id: 0,
            link_id: 0,
            cru_block_size: 8192,
            hb_period: 1,
            tf_period: 256,
            empty_hb_ratio: 0.0,
            payload_size: 64 * 1024,
            gbt_link_throughput: 3.2,
        }
    }
}

impl EmulatorConfig {
    /// Parse a YAML mapping. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading emulator configuration from {}", path.display());
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| EmulatorError::config_file(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the parameters against the header layout `H`.
    pub fn validate<H: HeaderLayout>(&self) -> Result<()> {
        if self.number_of_links == 0 {
            return Err(EmulatorError::config("numberOfLinks", "at least one link is required"));
        }
        if self.number_of_links > 256 - self.link_id as u32 {
            return Err(EmulatorError::config(
                "numberOfLinks",
                format!(
                    "{} links from id {} do not fit the 8-bit link id field",
                    self.number_of_links, self.link_id
                ),
            ));
        }
        if self.cru_block_size as usize <= H::SIZE {
            return Err(EmulatorError::config(
                "cruBlockSize",
                format!("{} must exceed the {}-byte header", self.cru_block_size, H::SIZE),
            ));
        }
        if self.cru_block_size > u16::MAX as u32 {
            return Err(EmulatorError::config(
                "cruBlockSize",
                format!("{} does not fit the 16-bit packet offset field", self.cru_block_size),
            ));
        }
        if self.hb_period == 0 {
            return Err(EmulatorError::config("HBperiod", "must be at least one orbit"));
        }
        if self.tf_period == 0 {
            return Err(EmulatorError::config("TFperiod", "must be at least one orbit"));
        }
        if !(0.0..=1.0).contains(&self.empty_hb_ratio) {
            return Err(EmulatorError::config(
                "EmptyHbRatio",
                format!("{} is not a fraction in [0, 1]", self.empty_hb_ratio),
            ));
        }
        if !(self.gbt_link_throughput.is_finite() && self.gbt_link_throughput > 0.0) {
            return Err(EmulatorError::config(
                "gbtLinkThroughput",
                format!("{} Gbit/s is not a positive rate", self.gbt_link_throughput),
            ));
        }
        if self.bc_step::<H>() == 0 {
            return Err(EmulatorError::config(
                "gbtLinkThroughput",
                format!(
                    "{} Gbit/s moves a {}-byte packet in less than one bunch crossing",
                    self.gbt_link_throughput, self.cru_block_size
                ),
            ));
        }
        if self.bc_step_exact::<H>() > MAX_BC_STEP as f64 {
            return Err(EmulatorError::config(
                "gbtLinkThroughput",
                format!(
                    "{} Gbit/s spaces packets more than {} bunch crossings apart",
                    self.gbt_link_throughput, MAX_BC_STEP
                ),
            ));
        }
        let packets_per_frame =
            (self.payload_size as u64).div_ceil(self.payload_per_packet::<H>() as u64).max(2);
        if packets_per_frame > MAX_PACKETS_PER_FRAME {
            return Err(EmulatorError::config(
                "PayloadSize",
                format!(
                    "{} bytes need {} packets per frame, the 16-bit pages counter allows {}",
                    self.payload_size, packets_per_frame, MAX_PACKETS_PER_FRAME
                ),
            ));
        }
        Ok(())
    }

    /// Payload bytes that fit in one packet after the header.
    pub fn payload_per_packet<H: HeaderLayout>(&self) -> usize {
        (self.cru_block_size as usize).saturating_sub(H::SIZE)
    }

    /// Bunch crossings between two packet transfers at the configured link rate.
    pub fn bc_step<H: HeaderLayout>(&self) -> u32 {
        self.bc_step_exact::<H>() as u32
    }

    fn bc_step_exact<H: HeaderLayout>(&self) -> f64 {
        let bytes_per_second = self.gbt_link_throughput * 1024.0 * 1024.0 * 1024.0 / 8.0;
        let seconds_per_packet = self.payload_per_packet::<H>() as f64 / bytes_per_second;
        (LHC_BC_RATE as f64 * seconds_per_packet).floor()
    }

    /// Link ids simulated, in round order.
    pub fn link_ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.number_of_links).map(move |i| (self.link_id as u32 + i) as u8)
    }
}
