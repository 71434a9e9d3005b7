//! Method adapter: native callables as MessagePack entry points.
//!
//! A [`PackedMethod`] wraps any `Fn(P1, ..., Pn) -> R` with up to eight
//! parameters, where every parameter implements [`Unpack`] and the result
//! implements [`Pack`]. The binding is resolved once: the parameter slots and
//! result slot are recorded at construction, and each call only decodes,
//! invokes and encodes.
//!
//! A request is an array with one element per parameter. The response is the
//! packed result; `()` results encode nil.
//!
//! # Example
//!
//! ```
//! use packwire::codec::{BytesSink, Encoder};
//! use packwire::rpc::PackedMethod;
//!
//! let add = PackedMethod::new(|a: i32, b: i32| a + b);
//!
//! let mut request = Encoder::buffered();
//! request.begin_array(2).unwrap().pack_int(1).unwrap().pack_int(2).unwrap();
//! let request = request.into_bytes().unwrap();
//!
//! let mut response = BytesSink::new();
//! add.call(&mut response, packwire::codec::SliceSource::new(request)).unwrap();
//! assert_eq!(response.as_slice(), &[0x03]);
//! ```

use std::any::type_name;
use std::fmt;

use serde::Serialize;

use crate::codec::{Decoder, Encoder, Pack, Sink, Source, Strategy, Unpack};
use crate::error::{PackError, Result};

/// Type-erased invoke step: decode arguments, call, encode the result.
type Invoke =
    dyn Fn(&mut Decoder<&mut dyn Source>, &mut Encoder<&mut dyn Sink>) -> Result<()> + Send + Sync;

/// One declared parameter of a bound callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSlot {
    /// Zero-based position in the argument array.
    pub index: usize,
    /// Rust type name of the parameter.
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// How the argument is decoded.
    pub strategy: Strategy,
}

impl ParamSlot {
    fn of<T: Unpack>(index: usize) -> Self {
        Self {
            index,
            type_name: type_name::<T>(),
            strategy: T::STRATEGY,
        }
    }
}

/// The result of a bound callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSlot {
    /// Rust type name of the result.
    #[serde(rename = "type")]
    pub type_name: &'static str,
    /// `true` when the callable returns `()`, which is answered with nil.
    pub void: bool,
}

impl ResultSlot {
    fn of<T>() -> Self {
        let type_name = type_name::<T>();
        Self {
            type_name,
            void: type_name == "()",
        }
    }
}

/// A callable bound to the codec.
pub struct PackedMethod {
    params: Vec<ParamSlot>,
    result: ResultSlot,
    invoke: Box<Invoke>,
}

impl PackedMethod {
    /// Bind a callable.
    pub fn new<Args, F>(callable: F) -> Self
    where
        F: IntoPackedMethod<Args>,
    {
        callable.into_packed_method()
    }

    /// Number of parameters.
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Declared parameters, in argument order.
    #[inline]
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Declared result.
    #[inline]
    pub fn result(&self) -> &ResultSlot {
        &self.result
    }

    /// Decode one request from `source`, invoke, and encode the result to `sink`.
    ///
    /// # Errors
    ///
    /// - [`PackError::IncompatibleUnpackType`] if the request is not an array
    /// - [`PackError::ArgumentCount`] if its length differs from [`arity`](Self::arity)
    /// - any decode error for an argument or encode error for the result
    pub fn call<W: Sink, R: Source>(&self, sink: W, source: R) -> Result<()> {
        let mut encoder = Encoder::new(sink);
        let mut decoder = Decoder::new(source);
        self.call_with(&mut encoder, &mut decoder)?;
        encoder.finish().map(drop)
    }

    /// Same as [`call`](Self::call) on caller-owned encoder and decoder.
    ///
    /// The result is written as the next value of `encoder`, so it may land
    /// inside a collection the caller has opened.
    pub fn call_with<W: Sink, R: Source>(
        &self,
        encoder: &mut Encoder<W>,
        decoder: &mut Decoder<R>,
    ) -> Result<()> {
        let actual = decoder.unpack_array()?;
        self.check_arity(actual)?;
        self.invoke(encoder, decoder)
    }

    pub(crate) fn check_arity(&self, actual: u32) -> Result<()> {
        if actual as usize != self.arity() {
            tracing::warn!(
                expected = self.arity(),
                actual,
                "argument count mismatch"
            );
            return Err(PackError::ArgumentCount {
                expected: self.arity(),
                actual: u64::from(actual),
            });
        }
        Ok(())
    }

    /// Decode the arguments that follow an already consumed array header.
    pub(crate) fn invoke<W: Sink, R: Source>(
        &self,
        encoder: &mut Encoder<W>,
        decoder: &mut Decoder<R>,
    ) -> Result<()> {
        decoder.with_dyn_source(|decoder| {
            encoder.with_dyn_sink(|encoder| (self.invoke)(decoder, encoder))
        })
    }
}

impl fmt::Debug for PackedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedMethod")
            .field("params", &self.params)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Conversion of a callable into a [`PackedMethod`].
///
/// Implemented for every `Fn(P1, ..., Pn) -> R` with `n <= 8`,
/// `Pi: Unpack` and `R: Pack`. `Args` is the parameter tuple and only
/// serves to keep the implementations apart.
pub trait IntoPackedMethod<Args> {
    /// Resolve the binding.
    fn into_packed_method(self) -> PackedMethod;
}

macro_rules! impl_into_packed_method {
    ($($param:ident)*) => {
        impl<Func, Ret, $($param,)*> IntoPackedMethod<($($param,)*)> for Func
        where
            Func: Fn($($param),*) -> Ret + Send + Sync + 'static,
            Ret: Pack + 'static,
            $($param: Unpack + 'static,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_packed_method(self) -> PackedMethod {
                let mut params = Vec::new();
                $(params.push(ParamSlot::of::<$param>(params.len()));)*

                let invoke = move |decoder: &mut Decoder<&mut dyn Source>,
                                   encoder: &mut Encoder<&mut dyn Sink>|
                      -> Result<()> {
                    $(let $param = <$param as Unpack>::unpack(decoder)?;)*
                    (self)($($param),*).pack(encoder)
                };

                PackedMethod {
                    params,
                    result: ResultSlot::of::<Ret>(),
                    invoke: Box::new(invoke),
                }
            }
        }
    };
}

impl_into_packed_method!();
impl_into_packed_method!(A);
impl_into_packed_method!(A B);
impl_into_packed_method!(A B C);
impl_into_packed_method!(A B C D);
impl_into_packed_method!(A B C D E);
impl_into_packed_method!(A B C D E F);
impl_into_packed_method!(A B C D E F G);
impl_into_packed_method!(A B C D E F G H);
