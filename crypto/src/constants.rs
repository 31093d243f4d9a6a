use crate::discrete_log::DiscreteLog;
use crate::error::ConfigError;
use crate::pow_radix::{PowRadix, PowRadixStyle};
use crate::random::Random;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable selecting the parameter set.
pub const PRIME_OPTION_VAR: &str = "CRYPTO_PRIME_OPTION";
/// Environment variable selecting the fixed-base table size.
pub const POW_RADIX_STYLE_VAR: &str = "CRYPTO_POW_RADIX_STYLE";
/// Environment variable bounding the discrete log search.
pub const DISCRETE_LOG_MAX_VAR: &str = "CRYPTO_DLOG_MAX";

pub const DEFAULT_DISCRETE_LOG_MAX: u64 = 10_000_000;

const STANDARD_LARGE_PRIME: &str = concat!(
    "8000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000303",
    "7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF00BAF1858D873C8EDA814CA7901CCB",
);
const STANDARD_COFACTOR: &str = concat!(
    "800000000000000000000000000000000000000000000000000000000000005E",
    "80000000000000000000000000000000000000000000000000000000000045C4",
    "8000000000000000000000000000000000000000000000000000000000338212",
    "80000000000000000000000000000000000000000000000000000000260707A8",
    "8000000000000000000000000000000000000000000000000000001C1330A766",
    "800000000000000000000000000000000000000000000000000014BA2AEB96AC",
    "800000000000000000000000000000000000000000000000000F4D71AFEE3D5A",
    "8000000000000000000000000000000000000000000000000B4C2CEEE2E34BD0",
    "800000000000000000000000000000000000000000000008573D2C5D81CEF8EE",
    "8000000000000000000000000000000000000000000006286829C108D5CDC814",
    "800000000000000000000000000000000000000000048BD4E6D38385D8ECB722",
    "8000000000000000000000000000000000000000035B3C2E6A2819D126C33478",
    "80000000000000000000000000000000000000027A5B6E445F9B0F699E1DBCF6",
    "80000000000000000000000000000000000001D45580687A957A60F9BBF481FC",
    "80000000000000000000000000000000000159C31FCD22805B59985FC383FA6E",
);
const STANDARD_GENERATOR: &str = concat!(
    "48597A98ADE5BB6D7D9A7F111736D79B983C4C79ACF5E78144DF5ADC9E6432F5",
    "D18367B03C84C1233D08767F55CEA6A22BB9FC63F6BD1938EF0491A2C23A6754",
    "902E32BF87886C4A32501BD76BD58010F584834095F3F8F5FF6B445D1BDBB318",
    "E91F5213FE1736038D14875EC978A3E3628AAE6B774640C4A2D7BAF25D45F08B",
    "92503B9038CD27D6A12BC5C5067B8B6936BB3E6394DBE4D07AF2D72EC74B0272",
    "F027A806E501B3DB0E6EE4B7063E10D85F4D00BDF2E04418E93A7F77DBE4CEC3",
    "9311400520D6153D5BD5309522B2D9B2916EB1482E7BC59FF81F7D6B1C035D52",
    "C35A4D602B139D3C6F239D48FD211B2F8BEB4E7E972AA25DC6FA2119A18CE16B",
    "67166F3902A8B7B538240B5B3EC28BCCA84EF85021863CEA84C34709CD83161A",
    "A8B3D15120DC21C50C8114B26F820E42B29FD6CC439005E96A90A33E4019B97D",
    "43F211D402BAE5F7132AE0126432D1F6E60E462EBF298E3FA062F517CB0A5D96",
    "FC2442BD57EFEA260829EE8A37B5B11057C1EBC2D709D9DA5A2BEF1AAD736501",
    "05FEF7EA1A6F6E78605A62B2DC910C2E6F21A5B24514B4E00E3864B8A4BB26FE",
    "CEABE0DC07AB8E2290F125CDEB17FD2DE0809205CAA633BD1E074CEA5D2C7800",
    "B03E2A2E4DCE82E651639A4C151691583124549880486380043CB3006BC6990D",
    "01322E9D9A0CEBB721C1C6BA22A2E9D7F2231B9C1ECDF4BE323B391A4F4FFEF0",
);

const LARGE_TEST_LARGE_PRIME: &str = concat!(
    "8000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "00000000000000000000000000000000000000000000000000000000000005C1",
    "7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFD9F4B87D",
);
const LARGE_TEST_COFACTOR: &str = concat!(
    "800000000000000000000000000000000000000000000000000000000000005E",
    "80000000000000000000000000000000000000000000000000000000000045C4",
    "80000000000000000000000000000000000000000000000000000000003387D4",
);
const LARGE_TEST_GENERATOR: &str = concat!(
    "27FBBAB6E844CB303B85A96372C4E6422BA54D130788BE3A6741597E1090FB99",
    "32AE11DDCD5D3FB7E50990ED6EAB153A6358A20F5E3448F425A11C2259B6A933",
    "A128E41C354363CCDD54663EECBD2371E4982405E97858526293D566BFF4D582",
    "95E2B9D9B8EB952244410AE1A4B2536B699DBB5C9AEFDA0637BA3C007081BE01",
);

// 2^256 - 189
const SMALL_PRIME_256: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF43";

/// The group parameters: P = Q * cofactor + 1 and g generates the order-Q subgroup of Z_p^*.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ElectionConstants {
    pub large_prime: BigUint,
    pub small_prime: BigUint,
    pub cofactor: BigUint,
    pub generator: BigUint,
}

/// Selects one of the built-in parameter sets.
///
/// Only `Standard` provides real security. The test sets exist so test
/// suites finish in seconds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrimeOption {
    /// 4096-bit P, 256-bit Q
    Standard,
    /// 1024-bit P, 256-bit Q
    LargeTest,
    /// 96-bit P, 32-bit Q
    MediumTest,
    /// P = 503, Q = 251
    SmallTest,
    /// P = 157, Q = 13
    ExtraSmallTest,
}

impl Default for PrimeOption {
    fn default() -> Self {
        PrimeOption::Standard
    }
}

impl fmt::Display for PrimeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimeOption::Standard => "standard",
            PrimeOption::LargeTest => "large_test",
            PrimeOption::MediumTest => "medium_test",
            PrimeOption::SmallTest => "small_test",
            PrimeOption::ExtraSmallTest => "extra_small_test",
        };
        f.write_str(name)
    }
}

impl FromStr for PrimeOption {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(PrimeOption::Standard),
            "large_test" | "largetest" => Ok(PrimeOption::LargeTest),
            "medium_test" | "mediumtest" => Ok(PrimeOption::MediumTest),
            "small_test" | "smalltest" => Ok(PrimeOption::SmallTest),
            "extra_small_test" | "extrasmalltest" => Ok(PrimeOption::ExtraSmallTest),
            _ => Err(ConfigError::UnknownPrimeOption(s.to_string())),
        }
    }
}

fn hex(value: &str) -> BigUint {
    // the built-in constants are well formed
    BigUint::parse_bytes(value.as_bytes(), 16).unwrap_or_else(BigUint::zero)
}

impl ElectionConstants {
    pub fn of(option: PrimeOption) -> Self {
        match option {
            PrimeOption::Standard => ElectionConstants {
                large_prime: hex(STANDARD_LARGE_PRIME),
                small_prime: hex(SMALL_PRIME_256),
                cofactor: hex(STANDARD_COFACTOR),
                generator: hex(STANDARD_GENERATOR),
            },
            PrimeOption::LargeTest => ElectionConstants {
                large_prime: hex(LARGE_TEST_LARGE_PRIME),
                small_prime: hex(SMALL_PRIME_256),
                cofactor: hex(LARGE_TEST_COFACTOR),
                generator: hex(LARGE_TEST_GENERATOR),
            },
            PrimeOption::MediumTest => ElectionConstants {
                large_prime: BigUint::from(39_614_081_257_132_169_129_631_940_159u128),
                small_prime: BigUint::from(4_294_967_291u64),
                cofactor: BigUint::from(9_223_372_047_592_194_138u64),
                generator: BigUint::from(517_388_772_719_325_482_675_356_647u128),
            },
            PrimeOption::SmallTest => ElectionConstants {
                large_prime: BigUint::from(503u32),
                small_prime: BigUint::from(251u32),
                cofactor: BigUint::from(2u32),
                generator: BigUint::from(4u32),
            },
            PrimeOption::ExtraSmallTest => ElectionConstants {
                large_prime: BigUint::from(157u32),
                small_prime: BigUint::from(13u32),
                cofactor: BigUint::from(12u32),
                generator: BigUint::from(14u32),
            },
        }
    }

    /// Checks the structural relations between the parameters.
    ///
    /// Both primes are tested with Miller-Rabin using `certainty` rounds.
    pub fn is_valid(&self, certainty: u32) -> bool {
        let one = BigUint::one();
        self.large_prime == &self.small_prime * &self.cofactor + &one
            && self.generator > one
            && self.generator < self.large_prime
            && self
                .generator
                .modpow(&self.small_prime, &self.large_prime)
                .is_one()
            && Random::is_prime(&self.small_prime, certainty)
            && Random::is_prime(&self.large_prime, certainty)
    }
}

/// Process-wide engine configuration.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub prime_option: PrimeOption,
    pub pow_radix_style: PowRadixStyle,
    pub discrete_log_max: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            prime_option: PrimeOption::Standard,
            pow_radix_style: PowRadixStyle::LowMemoryUse,
            discrete_log_max: DEFAULT_DISCRETE_LOG_MAX,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the environment. Unset variables keep
    /// their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();
        if let Ok(value) = env::var(PRIME_OPTION_VAR) {
            config.prime_option = value.parse()?;
        }
        if let Ok(value) = env::var(POW_RADIX_STYLE_VAR) {
            config.pow_radix_style = value.parse()?;
        }
        if let Ok(value) = env::var(DISCRETE_LOG_MAX_VAR) {
            config.discrete_log_max = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidDiscreteLogBound(value.clone()))?;
        }
        Ok(config)
    }
}

/// The active parameter set together with everything derived from it.
///
/// A context is immutable once built. Switching parameters builds a new
/// context and swaps it in, so holders of an old `Arc` keep a consistent
/// view.
pub struct GroupContext {
    config: EngineConfig,
    constants: ElectionConstants,
    generator_table: PowRadix,
    discrete_log: DiscreteLog,
}

impl GroupContext {
    pub fn new(config: &EngineConfig) -> Self {
        let constants = ElectionConstants::of(config.prime_option);
        info!(
            "building group context: option={} style={:?} dlog_max={}",
            config.prime_option, config.pow_radix_style, config.discrete_log_max
        );
        let generator_table = PowRadix::new(
            &constants.generator,
            &constants.large_prime,
            constants.small_prime.bits(),
            config.pow_radix_style,
        );
        let discrete_log = DiscreteLog::with_base(
            &constants.generator,
            &constants.large_prime,
            config.discrete_log_max,
        );
        GroupContext {
            config: *config,
            constants,
            generator_table,
            discrete_log,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn prime_option(&self) -> PrimeOption {
        self.config.prime_option
    }

    pub fn pow_radix_style(&self) -> PowRadixStyle {
        self.config.pow_radix_style
    }

    pub fn constants(&self) -> &ElectionConstants {
        &self.constants
    }

    pub fn p(&self) -> &BigUint {
        &self.constants.large_prime
    }

    pub fn q(&self) -> &BigUint {
        &self.constants.small_prime
    }

    pub fn g(&self) -> &BigUint {
        &self.constants.generator
    }

    pub fn cofactor(&self) -> &BigUint {
        &self.constants.cofactor
    }

    /// g^exponent mod P through the fixed-base table
    pub fn g_pow(&self, exponent: &BigUint) -> BigUint {
        self.generator_table.pow(exponent)
    }

    pub fn discrete_log(&self) -> &DiscreteLog {
        &self.discrete_log
    }
}

lazy_static! {
    static ref CONTEXT: RwLock<Option<Arc<GroupContext>>> = RwLock::new(None);
}

/// Returns the active group context, building it from the environment on first use.
pub fn group() -> Arc<GroupContext> {
    if let Some(ctx) = CONTEXT.read().as_ref() {
        return Arc::clone(ctx);
    }

    let mut slot = CONTEXT.write();
    if let Some(ctx) = slot.as_ref() {
        return Arc::clone(ctx);
    }
    let config = EngineConfig::from_env().unwrap_or_else(|err| {
        warn!("{}, falling back to the default configuration", err);
        EngineConfig::default()
    });
    let ctx = Arc::new(GroupContext::new(&config));
    *slot = Some(Arc::clone(&ctx));
    ctx
}

/// Builds a context for `config` and makes it the active one.
///
/// Elements, keys and ciphertexts created under the previous parameters
/// are meaningless under the new ones.
pub fn initialize(config: &EngineConfig) -> Arc<GroupContext> {
    let ctx = Arc::new(GroupContext::new(config));
    *CONTEXT.write() = Some(Arc::clone(&ctx));
    ctx
}

/// Switches to the given parameter set unless it is already active.
pub fn use_constants(option: PrimeOption, style: PowRadixStyle) -> Arc<GroupContext> {
    if let Some(ctx) = CONTEXT.read().as_ref() {
        if ctx.prime_option() == option && ctx.pow_radix_style() == style {
            return Arc::clone(ctx);
        }
    }

    let mut slot = CONTEXT.write();
    if let Some(ctx) = slot.as_ref() {
        if ctx.prime_option() == option && ctx.pow_radix_style() == style {
            return Arc::clone(ctx);
        }
    }
    let config = EngineConfig {
        prime_option: option,
        pow_radix_style: style,
        ..EngineConfig::default()
    };
    let ctx = Arc::new(GroupContext::new(&config));
    *slot = Some(Arc::clone(&ctx));
    ctx
}

/// Drops the active context. The next call to [`group`] rebuilds it from the environment.
pub fn flush() {
    debug!("flushing the group context");
    *CONTEXT.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::Helper;

    #[test]
    fn it_should_have_valid_test_constants() {
        for option in [
            PrimeOption::MediumTest,
            PrimeOption::SmallTest,
            PrimeOption::ExtraSmallTest,
        ] {
            let constants = ElectionConstants::of(option);
            assert!(constants.is_valid(20), "{} is invalid", option);
        }
    }

    #[test]
    fn it_should_have_valid_large_constants() {
        for option in [PrimeOption::Standard, PrimeOption::LargeTest] {
            let constants = ElectionConstants::of(option);
            assert_eq!(
                constants.large_prime,
                &constants.small_prime * &constants.cofactor + 1u32
            );
            assert!(constants
                .generator
                .modpow(&constants.small_prime, &constants.large_prime)
                .is_one());
        }
        assert_eq!(ElectionConstants::of(PrimeOption::Standard).large_prime.bits(), 4096);
        assert_eq!(ElectionConstants::of(PrimeOption::LargeTest).large_prime.bits(), 1024);
        assert_eq!(ElectionConstants::of(PrimeOption::Standard).small_prime.bits(), 256);
    }

    #[test]
    fn it_should_parse_prime_options() {
        assert_eq!("medium_test".parse::<PrimeOption>(), Ok(PrimeOption::MediumTest));
        assert_eq!("LargeTest".parse::<PrimeOption>(), Ok(PrimeOption::LargeTest));
        assert_eq!("extra-small-test".parse::<PrimeOption>(), Ok(PrimeOption::ExtraSmallTest));
        assert!("huge".parse::<PrimeOption>().is_err());
    }

    #[test]
    fn it_should_deserialize_partial_config() {
        let config: EngineConfig = serde_json::from_str(r#"{"prime_option":"small_test"}"#).unwrap();
        assert_eq!(config.prime_option, PrimeOption::SmallTest);
        assert_eq!(config.pow_radix_style, PowRadixStyle::LowMemoryUse);
        assert_eq!(config.discrete_log_max, DEFAULT_DISCRETE_LOG_MAX);
    }

    #[test]
    fn it_should_expose_the_active_parameters() {
        let ctx = Helper::setup_test_group();
        assert_eq!(ctx.prime_option(), PrimeOption::MediumTest);
        assert_eq!(ctx.q(), &BigUint::from(4_294_967_291u64));
        assert_eq!(ctx.g_pow(&BigUint::from(12345u32)), ctx.g().modpow(&BigUint::from(12345u32), ctx.p()));

        // same parameters, same context
        let again = use_constants(PrimeOption::MediumTest, PowRadixStyle::LowMemoryUse);
        assert!(Arc::ptr_eq(&ctx, &again));
    }
}
