//! Splitter sampling policies.
//!
//! A sampling policy draws a deterministic, seed-free sample from the
//! local container alone. The policy is a runtime tag resolved once per
//! partitioning call; the sampling loops themselves stay monomorphic.

use crate::container::{StringBlock, StringContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePolicy {
    /// Evenly spaced strings.
    NumStrings,
    /// One string per character-count stride.
    NumChars,
}

#[derive(Debug, Clone)]
pub struct Sampling {
    pub policy: SamplePolicy,
    /// Emit the sampled strings' indices alongside their bytes.
    pub indexed: bool,
    /// Oversampling factor: up to factor * (P - 1) strings per processor.
    pub factor: u64,
    /// Truncate sampled strings to this many bytes; 0 keeps them whole.
    pub depth_hint: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            policy: SamplePolicy::NumStrings,
            indexed: false,
            factor: 2,
            depth_hint: 0,
        }
    }
}

impl Sampling {
    pub fn num_strings() -> Self {
        Self::default()
    }

    pub fn num_chars() -> Self {
        Self {
            policy: SamplePolicy::NumChars,
            ..Self::default()
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn with_factor(mut self, factor: u64) -> Self {
        assert!(factor >= 1);
        self.factor = factor;
        self
    }

    pub fn with_depth_hint(mut self, depth_hint: u64) -> Self {
        self.depth_hint = depth_hint;
        self
    }

    /// Draw the local sample for a partitioning over `parts` processors.
    /// The container must be locally sorted.
    pub fn sample(&self, cont: &StringContainer, parts: usize) -> StringBlock {
        let target = (self.factor * (parts as u64 - 1)).min(cont.len() as u64) as usize;
        match self.policy {
            SamplePolicy::NumStrings => self.by_strings(cont, target),
            SamplePolicy::NumChars => self.by_chars(cont, target),
        }
    }

    fn emit(&self, cont: &StringContainer, i: usize, block: &mut StringBlock) {
        let mut s = cont.get(i);
        if self.depth_hint > 0 {
            s = &s[..s.len().min(self.depth_hint as usize)];
        }
        block.bytes.extend_from_slice(s);
        block.bytes.push(0);
        if self.indexed {
            block.indices.push(cont.index(i));
        }
    }

    fn by_strings(&self, cont: &StringContainer, target: usize) -> StringBlock {
        let mut block = StringBlock {
            bytes: Vec::new(),
            indices: Vec::new(),
            indexed: self.indexed,
        };
        if target == 0 {
            return block;
        }
        let dist = cont.len() / (target + 1);
        if dist == 0 {
            return block;
        }
        for k in 1..=target {
            self.emit(cont, k * dist, &mut block);
        }
        block
    }

    fn by_chars(&self, cont: &StringContainer, target: usize) -> StringBlock {
        let mut block = StringBlock {
            bytes: Vec::new(),
            indices: Vec::new(),
            indexed: self.indexed,
        };
        if target == 0 {
            return block;
        }
        let num_chars: usize = (0..cont.len()).map(|i| cont.get(i).len()).sum();
        let dist = num_chars / (target + 1);
        if dist == 0 {
            return block;
        }

        let mut i = 0;
        for _ in 1..=target {
            let mut seen = 0;
            while seen < dist && i < cont.len() {
                seen += cont.get(i).len();
                i += 1;
            }
            if i == 0 {
                break;
            }
            self.emit(cont, i - 1, &mut block);
            if i == cont.len() {
                break;
            }
        }
        block
    }
}
