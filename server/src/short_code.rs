// OmegaUpload Zero Knowledge File Hosting
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use rand::prelude::Distribution;
use rand::Rng;

/// Number of characters in a paste id. At 5 bits per character this gives 60
/// bits of randomness.
pub const SHORT_CODE_SIZE: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortCode<const N: usize>([ShortCodeChar; N]);

impl<const N: usize> Display for ShortCode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|c| write!(f, "{}", c.0))
    }
}

impl<const N: usize> Debug for ShortCode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.to_string()).finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidShortCode;

impl<const N: usize> FromStr for ShortCode<N> {
    type Err = InvalidShortCode;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        if v.len() != N || !v.is_ascii() {
            return Err(InvalidShortCode);
        }

        // This is fine, it'll get overwritten anyways.
        let mut output = [ShortCodeChar('\0'); N];
        for (slot, c) in output.iter_mut().zip(v.chars()) {
            *slot = c.try_into().map_err(|_| InvalidShortCode)?;
        }

        Ok(Self(output))
    }
}

/// `ShortCodeChar` uses the Word-safe alphabet, a Base32 extension of the Open
/// Location Code Base20 alphabet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ShortCodeChar(char);

impl TryFrom<char> for ShortCodeChar {
    type Error = InvalidShortCode;

    fn try_from(v: char) -> Result<Self, Self::Error> {
        if v.is_ascii() && ALPHABET.contains(&(v as u8)) {
            Ok(Self(v))
        } else {
            Err(InvalidShortCode)
        }
    }
}

pub struct Generator;

const ALPHABET: &[u8; 32] = b"23456789CFGHJMPQRVWXcfghjmpqrvwx";

impl Distribution<ShortCodeChar> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShortCodeChar {
        ShortCodeChar(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
    }
}

impl<const N: usize> Distribution<ShortCode<N>> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ShortCode<N> {
        let mut arr = [ShortCodeChar('\0'); N];

        for c in &mut arr {
            *c = self.sample(rng);
        }

        ShortCode(arr)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_codes_parse_back() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code: ShortCode<SHORT_CODE_SIZE> = rng.sample(Generator);
            let text = code.to_string();
            assert_eq!(text.len(), SHORT_CODE_SIZE);
            assert_eq!(text.parse::<ShortCode<SHORT_CODE_SIZE>>(), Ok(code));
        }
    }

    #[test]
    fn rejects_foreign_characters_and_lengths() {
        assert!("2345cfgh6789".parse::<ShortCode<12>>().is_ok());
        assert_eq!("2345cfgh678".parse::<ShortCode<12>>(), Err(InvalidShortCode));
        assert_eq!("0345cfgh6789".parse::<ShortCode<12>>(), Err(InvalidShortCode));
        assert_eq!("2345cfgh67é".parse::<ShortCode<12>>(), Err(InvalidShortCode));
    }
}
