use crate::util::constants::*;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// How survivors are evacuated.
#[derive(Copy, Clone, EnumString, Display, Debug, PartialEq, Eq)]
pub enum ScavengeMode {
    /// One thread runs a Cheney scan over the destination belt.
    Sequential,
    /// A fixed group of workers shares root, card and object tasks through work stealing.
    Parallel,
}

/// Share of the heap given to each belt, youngest first. Written `eden,to,mature`, e.g. `10,40,50`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BeltPercentages {
    pub eden: usize,
    pub to_space: usize,
    pub mature: usize,
}

impl BeltPercentages {
    pub const fn new(eden: usize, to_space: usize, mature: usize) -> Self {
        BeltPercentages {
            eden,
            to_space,
            mature,
        }
    }

    /// Each belt gets some of the heap, the belts do not exceed the heap together, and to-space
    /// can absorb a full eden.
    pub fn is_valid(&self) -> bool {
        self.eden > 0
            && self.to_space > 0
            && self.mature > 0
            && self.eden + self.to_space + self.mature <= 100
            && self.to_space >= self.eden
    }
}

impl Default for BeltPercentages {
    fn default() -> Self {
        BeltPercentages::new(10, 40, 50)
    }
}

impl FromStr for BeltPercentages {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .map_err(|e| format!("Failed to parse belt percentage {:?}: {}", p, e))
            })
            .collect::<Result<Vec<usize>, String>>()?;
        match parts[..] {
            [eden, to_space, mature] => Ok(BeltPercentages::new(eden, to_space, mature)),
            _ => Err("Please supply exactly three percentages (eden,to,mature)".into()),
        }
    }
}

impl fmt::Display for BeltPercentages {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{}", self.eden, self.to_space, self.mature)
    }
}

/// The default heap size.
pub const DEFAULT_HEAP_SIZE: usize = 64 << LOG_BYTES_IN_MBYTE;
/// The default size of the buffers collector threads copy into.
pub const DEFAULT_GC_LAB_BYTES: usize = 4 << LOG_BYTES_IN_KBYTE;
/// Larger heaps could not be rounded up to whole pages.
pub const MAX_HEAP_SIZE: usize = usize::MAX >> 1;

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        #[derive(Clone, Debug)]
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            /// Set an option from its snake-case name. Returns false and keeps the old value if the
            /// name is unknown, the value does not parse, or the value is rejected by its validator.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Keeping {:?}.", s, val, self.$name);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Can't parse value. Keeping {:?}.", s, val, self.$name);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}", s);
                        false
                    }
                }
            }

            /// Apply every environment variable of the form `BELTWAY_<OPTION>`, e.g. `BELTWAY_HEAP_SIZE`.
            /// Variables that do not name an option are ignored.
            pub fn read_env_var_settings(&mut self) {
                for (key, val) in std::env::vars() {
                    if let Some(rest_of_key) = key.strip_prefix(ENV_VAR_PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { self.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                Options {
                    $($name: $default),*
                }
            }
        }
    ]
}

/// Prefix of the environment variables that set options.
pub const ENV_VAR_PREFIX: &str = "BELTWAY_";

options! {
    // Total bytes reserved for the belts.
    heap_size:          usize            [|v: &usize| (BYTES_IN_PAGE..=MAX_HEAP_SIZE).contains(v)] = DEFAULT_HEAP_SIZE,
    // Share of the heap for eden, to-space and mature space.
    belt_percentages:   BeltPercentages  [|v: &BeltPercentages| v.is_valid()] = BeltPercentages::default(),
    // log2 of the bytes covered by one card (and one side-table chunk).
    log_card_bytes:     u8               [|v: &u8| (MIN_LOG_BYTES_IN_CARD..=MAX_LOG_BYTES_IN_CARD).contains(v)] = DEFAULT_LOG_BYTES_IN_CARD,
    // Number of workers used by parallel scavenging.
    threads:            usize            [|v: &usize| *v > 0] = num_cpus::get(),
    // Evacuate with one thread or with the worker group.
    scavenge_mode:      ScavengeMode     [always_valid] = ScavengeMode::Sequential,
    // Largest GC allocation buffer an evacuating thread takes from the destination. 0 disables them.
    gc_lab_bytes:       usize            [|v: &usize| *v % BYTES_IN_WORD == 0] = DEFAULT_GC_LAB_BYTES,
    // Verify donor and destination belts before and after every collection.
    verify_heap:        bool             [always_valid] = true,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::{serial_test, with_cleanup};

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.heap_size, DEFAULT_HEAP_SIZE);
        assert_eq!(options.belt_percentages, BeltPercentages::new(10, 40, 50));
        assert_eq!(options.log_card_bytes, DEFAULT_LOG_BYTES_IN_CARD);
        assert_eq!(options.scavenge_mode, ScavengeMode::Sequential);
        assert!(options.threads > 0);
        assert!(options.verify_heap);
        assert_eq!(options.gc_lab_bytes, DEFAULT_GC_LAB_BYTES);
    }

    #[test]
    fn set_valid_values() {
        let mut options = Options::default();
        assert!(options.set_from_str("heap_size", "1048576"));
        assert!(options.set_from_str("belt_percentages", "20, 30, 50"));
        assert!(options.set_from_str("scavenge_mode", "Parallel"));
        assert!(options.set_from_str("log_card_bytes", "6"));
        assert!(options.set_from_str("gc_lab_bytes", "0"));
        assert_eq!(options.heap_size, 1 << 20);
        assert_eq!(options.belt_percentages, BeltPercentages::new(20, 30, 50));
        assert_eq!(options.scavenge_mode, ScavengeMode::Parallel);
        assert_eq!(options.log_card_bytes, 6);
        assert_eq!(options.gc_lab_bytes, 0);
    }

    #[test]
    fn reject_invalid_percentages() {
        let mut options = Options::default();
        // Sum above 100.
        assert!(!options.set_from_str("belt_percentages", "30,40,50"));
        // To-space smaller than eden.
        assert!(!options.set_from_str("belt_percentages", "40,20,40"));
        // A zero-sized belt.
        assert!(!options.set_from_str("belt_percentages", "0,50,50"));
        // Wrong arity.
        assert!(!options.set_from_str("belt_percentages", "10,90"));
        assert_eq!(options.belt_percentages, BeltPercentages::default());
    }

    #[test]
    fn reject_invalid_values() {
        let mut options = Options::default();
        assert!(!options.set_from_str("log_card_bytes", "3"));
        assert!(!options.set_from_str("threads", "0"));
        assert!(!options.set_from_str("scavenge_mode", "Concurrent"));
        assert!(!options.set_from_str("no_such_option", "1"));
        assert!(!options.set_from_str("gc_lab_bytes", "100"));
        assert!(!options.set_from_str("heap_size", "1024"));
        assert!(!options.set_from_str("heap_size", &usize::MAX.to_string()));
        assert_eq!(options.log_card_bytes, DEFAULT_LOG_BYTES_IN_CARD);
    }

    #[test]
    fn with_valid_env_var() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("BELTWAY_HEAP_SIZE", "2097152");
                    std::env::set_var("BELTWAY_THREADS", "3");
                    let mut options = Options::default();
                    options.read_env_var_settings();
                    assert_eq!(options.heap_size, 2 << 20);
                    assert_eq!(options.threads, 3);
                },
                || {
                    std::env::remove_var("BELTWAY_HEAP_SIZE");
                    std::env::remove_var("BELTWAY_THREADS");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("BELTWAY_LOG_CARD_BYTES", "20");
                    let mut options = Options::default();
                    options.read_env_var_settings();
                    assert_eq!(options.log_card_bytes, DEFAULT_LOG_BYTES_IN_CARD);
                },
                || std::env::remove_var("BELTWAY_LOG_CARD_BYTES"),
            )
        })
    }
}
