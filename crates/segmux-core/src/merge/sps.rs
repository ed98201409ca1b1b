//! Minimal H.264 sequence parameter set parser: just enough to recover the
//! coded picture size after cropping.

use super::error::MergeError;

/// Display size decoded from an SPS NAL unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
}

/// Profiles that carry chroma format, bit depth and scaling matrices.
const HIGH_PROFILES: [u8; 13] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

/// Parses an SPS NAL unit (including its one-byte NAL header).
pub fn parse_sps(nal: &[u8]) -> Result<SpsInfo, MergeError> {
    let first = *nal.first().ok_or_else(|| invalid("empty SPS"))?;
    if first & 0x1f != 7 {
        return Err(invalid("not an SPS NAL unit"));
    }
    let rbsp = unescape(&nal[1..]);
    let mut r = BitReader::new(&rbsp);

    let profile_idc = r.u(8)? as u8;
    r.skip(8)?; // constraint flags + reserved
    let level_idc = r.u(8)? as u8;
    r.ue()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if HIGH_PROFILES.contains(&profile_idc) {
        chroma_format_idc = r.ue()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = r.flag()?;
        }
        r.ue()?; // bit_depth_luma_minus8
        r.ue()?; // bit_depth_chroma_minus8
        r.skip(1)?; // qpprime_y_zero_transform_bypass_flag
        if r.flag()? {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if r.flag()? {
                    skip_scaling_list(&mut r, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    r.ue()?; // log2_max_frame_num_minus4
    match r.ue()? {
        0 => {
            r.ue()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            r.skip(1)?; // delta_pic_order_always_zero_flag
            r.se()?; // offset_for_non_ref_pic
            r.se()?; // offset_for_top_to_bottom_field
            let cycle = r.ue()?;
            for _ in 0..cycle {
                r.se()?;
            }
        }
        _ => {}
    }
    r.ue()?; // max_num_ref_frames
    r.skip(1)?; // gaps_in_frame_num_value_allowed_flag
    let width_in_mbs = r.ue()?.checked_add(1).ok_or_else(|| invalid("SPS width overflow"))?;
    let height_in_map_units = r
        .ue()?
        .checked_add(1)
        .ok_or_else(|| invalid("SPS height overflow"))?;
    let frame_mbs_only = r.flag()?;
    if !frame_mbs_only {
        r.skip(1)?; // mb_adaptive_frame_field_flag
    }
    r.skip(1)?; // direct_8x8_inference_flag

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
    if r.flag()? {
        crop_left = r.ue()?;
        crop_right = r.ue()?;
        crop_top = r.ue()?;
        crop_bottom = r.ue()?;
    }

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let chroma_array_type = if separate_colour_plane { 0 } else { chroma_format_idc };
    let (crop_unit_x, crop_unit_y) = if chroma_array_type == 0 {
        (1, field_factor)
    } else {
        let sub_width = if chroma_format_idc == 3 { 1 } else { 2 };
        let sub_height = if chroma_format_idc == 1 { 2 } else { 1 };
        (sub_width, sub_height * field_factor)
    };

    let overflow = || invalid("SPS dimensions overflow");
    let coded_width = width_in_mbs.checked_mul(16).ok_or_else(overflow)?;
    let coded_height = height_in_map_units
        .checked_mul(16 * field_factor)
        .ok_or_else(overflow)?;
    let crop_x = crop_left
        .checked_add(crop_right)
        .and_then(|c| c.checked_mul(crop_unit_x))
        .ok_or_else(overflow)?;
    let crop_y = crop_top
        .checked_add(crop_bottom)
        .and_then(|c| c.checked_mul(crop_unit_y))
        .ok_or_else(overflow)?;
    let width = coded_width.saturating_sub(crop_x);
    let height = coded_height.saturating_sub(crop_y);
    Ok(SpsInfo {
        profile_idc,
        level_idc,
        width,
        height,
    })
}

fn skip_scaling_list(r: &mut BitReader<'_>, size: usize) -> Result<(), MergeError> {
    let mut last = 8i64;
    let mut next = 8i64;
    for _ in 0..size {
        if next != 0 {
            let delta = r.se()?;
            next = (last + delta + 256) % 256;
        }
        if next != 0 {
            last = next;
        }
    }
    Ok(())
}

/// Removes emulation prevention bytes (`00 00 03` → `00 00`).
fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &b in data {
        if zeros >= 2 && b == 3 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

fn invalid(msg: &str) -> MergeError {
    MergeError::InvalidSps(msg.to_string())
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bit(&mut self) -> Result<u32, MergeError> {
        let byte = self
            .data
            .get(self.pos / 8)
            .ok_or_else(|| invalid("truncated SPS"))?;
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(bit as u32)
    }

    fn flag(&mut self) -> Result<bool, MergeError> {
        Ok(self.bit()? == 1)
    }

    fn u(&mut self, n: u32) -> Result<u32, MergeError> {
        let mut v = 0;
        for _ in 0..n {
            v = (v << 1) | self.bit()?;
        }
        Ok(v)
    }

    fn skip(&mut self, n: usize) -> Result<(), MergeError> {
        for _ in 0..n {
            self.bit()?;
        }
        Ok(())
    }

    /// Unsigned exp-Golomb.
    fn ue(&mut self) -> Result<u32, MergeError> {
        let mut zeros = 0;
        while self.bit()? == 0 {
            zeros += 1;
            if zeros > 31 {
                return Err(invalid("exp-Golomb code too long"));
            }
        }
        Ok((1u32 << zeros) - 1 + self.u(zeros)?)
    }

    /// Signed exp-Golomb.
    fn se(&mut self) -> Result<i64, MergeError> {
        let k = self.ue()? as i64;
        Ok(if k % 2 == 1 { (k + 1) / 2 } else { -(k / 2) })
    }
}
