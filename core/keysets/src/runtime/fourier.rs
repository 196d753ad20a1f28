use crate::keys::{BootstrapKey, BootstrapKeyInfo, KeyEntity};
use std::ops::Deref;
use std::sync::Arc;
use tfhe::core_crypto::fft_impl::fft64::c64;
use tfhe::core_crypto::prelude::{
    par_convert_standard_lwe_bootstrap_key_to_fourier, Fft, FourierLweBootstrapKey,
    FourierLweBootstrapKeyOwned, PolynomialSize,
};

/// A bootstrap key converted to the Fourier domain, with the FFT plan sized for it.
pub struct FourierBootstrapKey {
    info: BootstrapKeyInfo,
    key: FourierLweBootstrapKeyOwned,
    fft: Fft,
}

impl FourierBootstrapKey {
    /// Converts a standard-domain bootstrap key.
    ///
    /// The Fourier key holds half as many complex values as the raw key has
    /// coefficients, since the transform of a real polynomial is conjugate symmetric.
    pub fn convert(bsk: &BootstrapKey) -> Self {
        let raw = bsk.key();
        let fft = Fft::new(PolynomialSize(bsk.info().params.polynomial_size));
        let mut key = FourierLweBootstrapKey::new(
            raw.input_lwe_dimension(),
            raw.glwe_size(),
            raw.polynomial_size(),
            raw.decomposition_base_log(),
            raw.decomposition_level_count(),
        );
        par_convert_standard_lwe_bootstrap_key_to_fourier(raw, &mut key);
        tracing::debug!(
            "Converted bootstrap key {} to the Fourier domain ({} coefficients)",
            bsk.id(),
            raw.as_ref().len()
        );
        Self {
            info: *bsk.info(),
            key,
            fft,
        }
    }

    pub fn info(&self) -> &BootstrapKeyInfo {
        &self.info
    }

    pub fn key(&self) -> &FourierLweBootstrapKeyOwned {
        &self.key
    }

    pub fn data(&self) -> &[c64] {
        self.key.as_view().data()
    }

    pub fn fft(&self) -> &Fft {
        &self.fft
    }
}

/// Shared read-only view of the Fourier coefficients of a bootstrap key.
#[derive(Clone)]
pub struct FourierBootstrapKeyBuffer(pub(crate) Arc<FourierBootstrapKey>);

impl FourierBootstrapKeyBuffer {
    pub fn key(&self) -> &FourierBootstrapKey {
        &self.0
    }
}

impl Deref for FourierBootstrapKeyBuffer {
    type Target = [c64];

    fn deref(&self) -> &Self::Target {
        self.0.data()
    }
}

/// Shared handle on the FFT plan of a bootstrap key.
#[derive(Clone)]
pub struct FftHandle(pub(crate) Arc<FourierBootstrapKey>);

impl Deref for FftHandle {
    type Target = Fft;

    fn deref(&self) -> &Self::Target {
        self.0.fft()
    }
}
