use crate::error::AssembleError;

/// A file-relative byte offset.
pub type Addr = u32;

pub const WORD_SIZE: u32 = 4;
pub const POINTER_SIZE: u32 = 4;
pub const POINTER_ALIGNMENT: u32 = 4;
pub const SECTION_ALIGNMENT: u32 = 16;

/// Rounds `addr` up to the next multiple of `width`.
///
/// Widths 0 and 1 mean "no alignment" and return `addr` unchanged; an
/// address already on a multiple of `width` is also returned unchanged.
/// Any width outside {0, 1, 4, 8, 16} is a contract violation.
///
/// This is the sole authority for every padding decision in the linker,
/// including the 16-byte section and end-of-file boundaries.
pub fn align_to_width(addr: Addr, width: u32) -> Result<Addr, AssembleError> {
    match width {
        0 | 1 => Ok(addr),
        4 | 8 | 16 => {
            let mask = width - 1;
            Ok((addr + mask) & !mask)
        }
        _ => Err(AssembleError::InvalidAlignment { width }),
    }
}

/// Where a run of bytes landed in the file.
///
/// Returned from every `append_bytes` call so the object being assembled
/// can learn its final placement, including any alignment padding that
/// was inserted before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembleAddressContext {
    /// Current address before this append, pre-padding.
    pub prior_current_address: Addr,
    /// Address of the first payload byte, post-padding.
    pub data_start_address: Addr,
    /// Current address after this append.
    pub final_current_address: Addr,
}

impl AssembleAddressContext {
    /// Zero bytes inserted before the payload to satisfy its alignment.
    pub fn padding(&self) -> u32 {
        self.data_start_address - self.prior_current_address
    }

    /// Payload length, excluding padding.
    pub fn size(&self) -> u32 {
        self.final_current_address - self.data_start_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_alignment_widths_are_identity() {
        for width in [0, 1].iter() {
            for addr in [0, 1, 3, 17, 255].iter() {
                assert_eq!(Ok(*addr), align_to_width(*addr, *width));
            }
        }
    }

    #[test]
    fn rounds_up_to_next_multiple() {
        assert_eq!(Ok(4), align_to_width(1, 4));
        assert_eq!(Ok(4), align_to_width(3, 4));
        assert_eq!(Ok(8), align_to_width(5, 8));
        assert_eq!(Ok(16), align_to_width(9, 16));
        assert_eq!(Ok(32), align_to_width(17, 16));
    }

    #[test]
    fn aligned_address_is_unchanged() {
        assert_eq!(Ok(0), align_to_width(0, 16));
        assert_eq!(Ok(8), align_to_width(8, 4));
        assert_eq!(Ok(16), align_to_width(16, 8));
        assert_eq!(Ok(48), align_to_width(48, 16));
    }

    #[test]
    fn unsupported_width_is_rejected() {
        for width in [2, 3, 5, 7, 32, 64].iter() {
            assert_eq!(
                Err(AssembleError::InvalidAlignment { width: *width }),
                align_to_width(12, *width)
            );
        }
    }

    #[test]
    fn address_context_padding_and_size() {
        let addrs = AssembleAddressContext {
            prior_current_address: 5,
            data_start_address: 8,
            final_current_address: 20,
        };
        assert_eq!(3, addrs.padding());
        assert_eq!(12, addrs.size());
    }
}
