//! Helpers to read packed records field by field.
//!
//! Much like `bincode` for plain structs, but every field
//! read is wrapped with context naming the record and the
//! field, so a truncated file says where it stopped.

use std::io::Read;

use anyhow::Result;
use byteordered::{byteorder::ReadBytesExt, ByteOrdered, Endian};

/// Declare a struct that can be parsed from a
/// [`ByteOrdered`] reader, one field after another in
/// declaration order.
macro_rules! declare_parseable_record {
    (
        $(#[$smeta:meta])*
        $svis:vis struct $sname:ident {
            $($fvis:vis $name:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$smeta])*
        $svis struct $sname {
            $($fvis $name: $ty),*
        }

        impl crate::parse::Parseable for $sname {
            fn parse<R, E>(r: &mut byteordered::ByteOrdered<R, E>) -> anyhow::Result<Self>
            where
                R: byteordered::byteorder::ReadBytesExt,
                E: byteordered::Endian,
            {
                $(
                    let $name = anyhow::Context::with_context(
                        <$ty as crate::parse::Parseable>::parse(r),
                        || format!("parsing field `{}.{}`", stringify!($sname), stringify!($name)),
                    )?;
                )*
                Ok($sname { $($name),* })
            }
        }
    };
}

pub(crate) trait Parseable: Sized {
    fn parse<R: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<R, E>) -> Result<Self>;
}

macro_rules! impl_parseable {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(
            impl Parseable for $ty {
                fn parse<R: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<R, E>) -> Result<Self> {
                    Ok(r.$method()?)
                }
            }
        )*
    };
}

impl_parseable!(
    u8 => read_u8,
    u16 => read_u16,
    u32 => read_u32,
    f32 => read_f32,
);

impl<const N: usize> Parseable for [u8; N] {
    fn parse<R: ReadBytesExt, E: Endian>(r: &mut ByteOrdered<R, E>) -> Result<Self> {
        let mut out = [0u8; N];
        r.read_exact(&mut out)?;
        Ok(out)
    }
}

/// Read `count` consecutive values of the same type.
pub(crate) fn parse_many<T, R, E>(r: &mut ByteOrdered<R, E>, count: usize) -> Result<Vec<T>>
where
    T: Parseable,
    R: ReadBytesExt,
    E: Endian,
{
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::parse(r)?);
    }
    Ok(out)
}
