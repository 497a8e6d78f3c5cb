//! Eigensolver parameters.
//!
//! This module provides the `EigParams` struct, the read-only configuration that
//! drives every eigensolver in the crate. Parameters are set through builder methods
//! and checked once by [`EigParams::validate`] before a solve starts; a solver never
//! mutates them.

use std::str::FromStr;

use bitflags::bitflags;

use crate::error::EigError;

/// Part of the spectrum to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spectrum {
    /// Smallest real part (`"SR"`)
    SmallestReal,
    /// Largest real part (`"LR"`)
    LargestReal,
    /// Smallest magnitude (`"SM"`)
    SmallestMagnitude,
    /// Largest magnitude (`"LM"`)
    LargestMagnitude,
    /// Smallest imaginary part (`"SI"`); not meaningful for Hermitian problems
    SmallestImag,
    /// Largest imaginary part (`"LI"`); not meaningful for Hermitian problems
    LargestImag,
}

impl Spectrum {
    /// True when the wanted eigenvalues sit at the low end of the real axis.
    pub fn is_low_end(self) -> bool {
        matches!(self, Spectrum::SmallestReal | Spectrum::SmallestMagnitude)
    }

    pub fn is_magnitude(self) -> bool {
        matches!(self, Spectrum::SmallestMagnitude | Spectrum::LargestMagnitude)
    }

    pub fn is_imaginary(self) -> bool {
        matches!(self, Spectrum::SmallestImag | Spectrum::LargestImag)
    }

    /// Ordering of two real eigenvalue estimates under this target: `Less` means
    /// `a` is wanted before `b`.
    pub fn compare(self, a: f64, b: f64) -> std::cmp::Ordering {
        match self {
            Spectrum::SmallestReal | Spectrum::SmallestImag => a.total_cmp(&b),
            Spectrum::LargestReal | Spectrum::LargestImag => b.total_cmp(&a),
            Spectrum::SmallestMagnitude => a.abs().total_cmp(&b.abs()),
            Spectrum::LargestMagnitude => b.abs().total_cmp(&a.abs()),
        }
    }
}

impl FromStr for Spectrum {
    type Err = EigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SR" => Ok(Spectrum::SmallestReal),
            "LR" => Ok(Spectrum::LargestReal),
            "SM" => Ok(Spectrum::SmallestMagnitude),
            "LM" => Ok(Spectrum::LargestMagnitude),
            "SI" => Ok(Spectrum::SmallestImag),
            "LI" => Ok(Spectrum::LargestImag),
            other => Err(EigError::Config(format!("unknown spectrum selector '{other}'"))),
        }
    }
}

bitflags! {
    /// Form of the operator seen by the solver: M, M†, M†M or MM†.
    ///
    /// The empty set is the plain operator M. `NORMAL` alone is M†M,
    /// `NORMAL | DAGGER` is MM†.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpForm: u8 {
        const DAGGER = 0b01;
        const NORMAL = 0b10;
    }
}

/// Eigensolver strategy, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigType {
    /// Thick-restart Lanczos
    Trlm,
    /// Dense eigen-decomposition of the materialized operator (small, single-process problems)
    Dense,
}

/// Eigensolver configuration.
#[derive(Debug, Clone)]
pub struct EigParams {
    /// Size of the initial factorisation; lower bound on the retained basis after a restart
    pub n_ev: usize,
    /// Size of the Krylov space after extension
    pub n_kr: usize,
    /// Number of converged eigenpairs requested
    pub n_conv: usize,
    /// Relative residual tolerance
    pub tol: f64,
    /// Part of the spectrum to compute
    pub spectrum: Spectrum,
    /// Invert the Ritz ordering (set when the polynomial filter flips the wanted end)
    pub reverse: bool,
    /// Apply Chebyshev polynomial acceleration in the Lanczos steps
    pub use_poly_acc: bool,
    /// Degree of the Chebyshev polynomial
    pub poly_deg: usize,
    /// Interval `[a, b]` suppressed by the polynomial filter
    pub poly_bounds: Option<(f64, f64)>,
    pub max_restarts: usize,
    /// Extension steps between intermediate convergence checks; 0 checks only when full
    pub check_interval: usize,
    /// Derive singular triplets from a normal-operator eigenproblem
    pub compute_svd: bool,
    pub op_form: OpForm,
    pub eig_type: EigType,
    /// Seed for the initial random vector
    pub seed: u64,
    /// Checkpoint identifier to load eigenvectors from
    pub vec_infile: Option<String>,
    /// Checkpoint identifier to save converged eigenvectors to
    pub vec_outfile: Option<String>,
    /// Make checkpoint load/validation failures fatal
    pub strict_load: bool,
    /// Report exhaustion of `max_restarts` as an error instead of a partial result
    pub require_convergence: bool,
    /// Orthogonalise with one block reduction per pass instead of one per vector
    pub block_ortho: bool,
}

impl Default for EigParams {
    fn default() -> Self {
        Self {
            n_ev: 16,
            n_kr: 32,
            n_conv: 16,
            tol: 1e-6,
            spectrum: Spectrum::SmallestReal,
            reverse: false,
            use_poly_acc: false,
            poly_deg: 0,
            poly_bounds: None,
            max_restarts: 100,
            check_interval: 0,
            compute_svd: false,
            op_form: OpForm::empty(),
            eig_type: EigType::Trlm,
            seed: 137,
            vec_infile: None,
            vec_outfile: None,
            strict_load: false,
            require_convergence: false,
            block_ortho: true,
        }
    }
}

impl EigParams {
    /// Create parameters with the given problem sizes and tolerance.
    pub fn new(n_ev: usize, n_kr: usize, n_conv: usize, tol: f64) -> Self {
        Self { n_ev, n_kr, n_conv, tol, ..Self::default() }
    }

    pub fn with_spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectrum = spectrum;
        if self.use_poly_acc {
            self.reverse = self.filter_reverses();
        }
        self
    }

    /// Enable Chebyshev acceleration suppressing `[a_min, a_max]`.
    ///
    /// `reverse` is set to match the filter: for low-end targets an even degree maps
    /// the wanted eigenvalues to large positive values.
    pub fn with_poly_acc(mut self, degree: usize, a_min: f64, a_max: f64) -> Self {
        self.use_poly_acc = true;
        self.poly_deg = degree;
        self.poly_bounds = Some((a_min, a_max));
        self.reverse = self.filter_reverses();
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: usize) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_check_interval(mut self, check_interval: usize) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn with_op_form(mut self, op_form: OpForm) -> Self {
        self.op_form = op_form;
        self
    }

    /// Enable SVD mode on the given normal form.
    pub fn with_svd(mut self, op_form: OpForm) -> Self {
        self.compute_svd = true;
        self.op_form = op_form;
        self
    }

    pub fn with_eig_type(mut self, eig_type: EigType) -> Self {
        self.eig_type = eig_type;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_vec_infile(mut self, id: impl Into<String>) -> Self {
        self.vec_infile = Some(id.into());
        self
    }

    pub fn with_vec_outfile(mut self, id: impl Into<String>) -> Self {
        self.vec_outfile = Some(id.into());
        self
    }

    pub fn with_strict_load(mut self, strict: bool) -> Self {
        self.strict_load = strict;
        self
    }

    pub fn with_require_convergence(mut self, require: bool) -> Self {
        self.require_convergence = require;
        self
    }

    pub fn with_block_ortho(mut self, block: bool) -> Self {
        self.block_ortho = block;
        self
    }

    fn filter_reverses(&self) -> bool {
        self.spectrum.is_low_end() && self.poly_deg % 2 == 0
    }

    /// Target used to order Ritz values of the operator the Lanczos recurrence sees.
    ///
    /// Without acceleration this is `spectrum`. With acceleration the wanted
    /// eigenvalues are mapped outside `[-1, 1]`: high-end targets and even-degree
    /// low-end targets become the largest filtered values, odd-degree low-end
    /// targets the smallest.
    pub fn ritz_target(&self) -> Spectrum {
        if !self.use_poly_acc {
            return self.spectrum;
        }
        if self.spectrum.is_low_end() && !self.reverse {
            Spectrum::SmallestReal
        } else {
            Spectrum::LargestReal
        }
    }

    /// Check the configuration; every violation is fatal.
    pub fn validate(&self) -> Result<(), EigError> {
        if self.n_ev == 0 || self.n_kr <= self.n_ev {
            return Err(EigError::Config(format!(
                "n_kr = {} must be greater than n_ev = {} > 0",
                self.n_kr, self.n_ev
            )));
        }
        // The residual direction needs one slot of the Krylov basis that is never
        // filled by a converged pair.
        if self.n_conv == 0 || self.n_conv >= self.n_kr {
            return Err(EigError::Config(format!(
                "n_conv = {} must be in 1..{}",
                self.n_conv, self.n_kr
            )));
        }
        if !(self.tol > 0.0) {
            return Err(EigError::Config(format!("tol = {} must be positive", self.tol)));
        }
        if self.max_restarts == 0 {
            return Err(EigError::Config("max_restarts must be positive".into()));
        }
        if self.spectrum.is_imaginary() {
            return Err(EigError::Config(format!(
                "spectrum {:?} is not supported for a Hermitian eigenproblem",
                self.spectrum
            )));
        }
        if self.use_poly_acc {
            if self.poly_deg == 0 {
                return Err(EigError::Config(
                    "polynomial acceleration requires a positive degree".into(),
                ));
            }
            if self.spectrum.is_magnitude() {
                return Err(EigError::Config(format!(
                    "spectrum {:?} cannot be combined with polynomial acceleration",
                    self.spectrum
                )));
            }
            if self.reverse != self.filter_reverses() {
                return Err(EigError::Config(format!(
                    "reverse = {} does not match spectrum {:?} with polynomial degree {}",
                    self.reverse, self.spectrum, self.poly_deg
                )));
            }
        }
        if let Some((a, b)) = self.poly_bounds {
            if !(a.is_finite() && b.is_finite() && a < b) {
                return Err(EigError::Config(format!(
                    "polynomial bounds [{a}, {b}] must be a finite, non-empty interval"
                )));
            }
        }
        if self.compute_svd && !self.op_form.contains(OpForm::NORMAL) {
            return Err(EigError::Config(
                "SVD mode requires a normal operator form (M†M or MM†)".into(),
            ));
        }
        Ok(())
    }
}
