//! Packed blend, mask and depth-test state
//!
//! Blend factors occupy two 4-bit fields; everything else is a plain flag.
//! The zero value of every field is the common case (`ONE`/`ZERO` blending,
//! all channels written, `LESS` depth test).

use bitflags::bitflags;

bitflags! {
    /// GPU blend/depth/mask state applied with a single call
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateBits: u32 {
        /// Source blend factor field
        const SRCBLEND_BITS = 0x0000_000f;
        /// Destination blend factor field
        const DSTBLEND_BITS = 0x0000_00f0;

        /// Depth writes disabled
        const DEPTHMASK = 0x0000_0100;
        /// Red writes disabled
        const REDMASK = 0x0000_0200;
        /// Green writes disabled
        const GREENMASK = 0x0000_0400;
        /// Blue writes disabled
        const BLUEMASK = 0x0000_0800;
        /// Alpha writes disabled
        const ALPHAMASK = 0x0000_1000;
        /// All colour writes disabled
        const COLORMASK = Self::REDMASK.bits() | Self::GREENMASK.bits() | Self::BLUEMASK.bits();

        /// Wireframe rasterisation
        const POLYMODE_LINE = 0x0000_2000;

        /// Depth test always passes
        const DEPTHFUNC_ALWAYS = 0x0001_0000;
        /// Depth test passes on equal depth
        const DEPTHFUNC_EQUAL = 0x0002_0000;
        /// Depth function field
        const DEPTHFUNC_BITS = 0x0003_0000;
    }
}

/// Source blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SrcBlend {
    /// 1
    One = 0x0,
    /// 0
    Zero = 0x1,
    /// Destination colour
    DstColor = 0x3,
    /// 1 - destination colour
    OneMinusDstColor = 0x4,
    /// Source alpha
    SrcAlpha = 0x5,
    /// 1 - source alpha
    OneMinusSrcAlpha = 0x6,
    /// Destination alpha
    DstAlpha = 0x7,
    /// 1 - destination alpha
    OneMinusDstAlpha = 0x8,
    /// min(As, 1 - Ad)
    AlphaSaturate = 0x9,
}

/// Destination blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DstBlend {
    /// 0
    Zero = 0x00,
    /// 1
    One = 0x20,
    /// Source colour
    SrcColor = 0x30,
    /// 1 - source colour
    OneMinusSrcColor = 0x40,
    /// Source alpha
    SrcAlpha = 0x50,
    /// 1 - source alpha
    OneMinusSrcAlpha = 0x60,
    /// Destination alpha
    DstAlpha = 0x70,
    /// 1 - destination alpha
    OneMinusDstAlpha = 0x80,
}

/// Depth comparison selected by the depth function field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    /// Pass when closer
    Less,
    /// Pass on equal depth
    Equal,
    /// Always pass
    Always,
}

impl DepthFunc {
    /// The bits selecting this function
    pub const fn bits(self) -> StateBits {
        match self {
            Self::Less => StateBits::empty(),
            Self::Equal => StateBits::DEPTHFUNC_EQUAL,
            Self::Always => StateBits::DEPTHFUNC_ALWAYS,
        }
    }
}

impl SrcBlend {
    const ALL: [Self; 9] = [
        Self::One,
        Self::Zero,
        Self::DstColor,
        Self::OneMinusDstColor,
        Self::SrcAlpha,
        Self::OneMinusSrcAlpha,
        Self::DstAlpha,
        Self::OneMinusDstAlpha,
        Self::AlphaSaturate,
    ];
}

impl DstBlend {
    const ALL: [Self; 8] = [
        Self::Zero,
        Self::One,
        Self::SrcColor,
        Self::OneMinusSrcColor,
        Self::SrcAlpha,
        Self::OneMinusSrcAlpha,
        Self::DstAlpha,
        Self::OneMinusDstAlpha,
    ];
}

impl StateBits {
    /// Bits for a blend factor pair
    pub const fn blend(src: SrcBlend, dst: DstBlend) -> Self {
        Self::from_bits_retain(src as u32 | dst as u32)
    }

    /// Replace the blend fields
    #[must_use]
    pub const fn with_blend(self, src: SrcBlend, dst: DstBlend) -> Self {
        Self::from_bits_retain(
            (self.bits() & !(Self::SRCBLEND_BITS.bits() | Self::DSTBLEND_BITS.bits()))
                | src as u32
                | dst as u32,
        )
    }

    /// Replace the depth function field
    #[must_use]
    pub const fn with_depth_func(self, func: DepthFunc) -> Self {
        Self::from_bits_retain((self.bits() & !Self::DEPTHFUNC_BITS.bits()) | func.bits().bits())
    }

    /// Decode the source blend factor, `One` for unknown encodings
    pub fn src_blend(self) -> SrcBlend {
        let field = self.bits() & Self::SRCBLEND_BITS.bits();
        SrcBlend::ALL
            .into_iter()
            .find(|factor| *factor as u32 == field)
            .unwrap_or(SrcBlend::One)
    }

    /// Decode the destination blend factor, `Zero` for unknown encodings
    pub fn dst_blend(self) -> DstBlend {
        let field = self.bits() & Self::DSTBLEND_BITS.bits();
        DstBlend::ALL
            .into_iter()
            .find(|factor| *factor as u32 == field)
            .unwrap_or(DstBlend::Zero)
    }

    /// Decode the depth function
    pub const fn depth_func(self) -> DepthFunc {
        if self.contains(Self::DEPTHFUNC_EQUAL) {
            DepthFunc::Equal
        } else if self.contains(Self::DEPTHFUNC_ALWAYS) {
            DepthFunc::Always
        } else {
            DepthFunc::Less
        }
    }

    /// Whether the blend pair is exactly `(src, dst)`
    pub fn blends(self, src: SrcBlend, dst: DstBlend) -> bool {
        self.src_blend() == src && self.dst_blend() == dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_fields_round_trip() {
        let bits = StateBits::blend(SrcBlend::SrcAlpha, DstBlend::OneMinusSrcAlpha) | StateBits::DEPTHMASK;
        assert_eq!(bits.src_blend(), SrcBlend::SrcAlpha);
        assert_eq!(bits.dst_blend(), DstBlend::OneMinusSrcAlpha);
        assert!(bits.contains(StateBits::DEPTHMASK));
    }

    #[test]
    fn test_zero_fields_are_defaults() {
        let bits = StateBits::empty();
        assert!(bits.blends(SrcBlend::One, DstBlend::Zero));
        assert_eq!(bits.depth_func(), DepthFunc::Less);
    }

    #[test]
    fn test_with_depth_func_replaces_field() {
        let bits = StateBits::DEPTHMASK | StateBits::DEPTHFUNC_EQUAL;
        let relaxed = bits.with_depth_func(DepthFunc::Less);
        assert_eq!(relaxed, StateBits::DEPTHMASK);
        assert_eq!(relaxed.with_depth_func(DepthFunc::Always).depth_func(), DepthFunc::Always);
    }

    #[test]
    fn test_with_blend_keeps_other_bits() {
        let bits = StateBits::blend(SrcBlend::DstColor, DstBlend::Zero) | StateBits::ALPHAMASK;
        let additive = bits.with_blend(SrcBlend::One, DstBlend::One);
        assert!(additive.blends(SrcBlend::One, DstBlend::One));
        assert!(additive.contains(StateBits::ALPHAMASK));
    }
}
