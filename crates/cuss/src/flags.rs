//! Processor State Register (PSR) flags.

use bitflags::bitflags;

bitflags! {
    /// The four integer condition-code flags, packed into the low 4 bits.
    ///
    /// # Bit Layout
    ///
    /// ```text
    /// 3 2 1 0
    /// N V C Z
    /// ```
    ///
    /// Flags are **OR'd in**, never assigned: a flag-setting instruction can
    /// only turn a flag on, never off. There is no instruction that clears a
    /// flag; the only way flags return to zero is [`crate::cpu::Cpu::reset`].
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Psr: u8 {
        const Zero     = 0b0000_0001;
        const Carry    = 0b0000_0010;
        const Overflow = 0b0000_0100;
        const Negative = 0b0000_1000;
    }
}

impl Psr {
    /// Sets `flag` if `cond` is true; leaves it untouched otherwise. Never clears.
    #[inline]
    pub fn set_if(&mut self, flag: Psr, cond: bool) {
        if cond {
            self.insert(flag);
        }
    }

    #[must_use]
    #[inline]
    pub fn zero(self) -> bool {
        self.contains(Psr::Zero)
    }

    #[must_use]
    #[inline]
    pub fn carry(self) -> bool {
        self.contains(Psr::Carry)
    }

    #[must_use]
    #[inline]
    pub fn overflow(self) -> bool {
        self.contains(Psr::Overflow)
    }

    #[must_use]
    #[inline]
    pub fn negative(self) -> bool {
        self.contains(Psr::Negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_never_clears() {
        let mut psr = Psr::empty();
        psr.set_if(Psr::Zero, true);
        assert!(psr.zero());
        psr.set_if(Psr::Zero, false);
        assert!(psr.zero(), "a false condition must not clear an already-set flag");
    }

    #[test]
    fn flags_are_independent() {
        let mut psr = Psr::empty();
        psr.set_if(Psr::Negative, true);
        assert!(psr.negative());
        assert!(!psr.carry());
        assert!(!psr.overflow());
        assert!(!psr.zero());
    }
}
