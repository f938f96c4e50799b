//! Command-line flags: one sensor type per flag, the last one given wins.

use crate::hal::SensorType;
use tracing::{info, warn};

/// Option characters and the sensor type each selects
const FLAGS: &[(char, SensorType, &str)] = &[
    ('a', SensorType::Accelerometer, "accelerometer"),
    ('m', SensorType::MagneticField, "magnetometer"),
    ('o', SensorType::Orientation, "orientation"),
    ('p', SensorType::Proximity, "proximity"),
    ('t', SensorType::Temperature, "temperature"),
    ('l', SensorType::Light, "light"),
    ('g', SensorType::Gyroscope, "gyro"),
];

/// Parse getopt-style flags (program name excluded).
///
/// Flags may be given separately (`-a -m`) or clustered (`-am`). Unknown flags
/// and operands are ignored and `--` ends option parsing.
pub fn parse_selection<I, S>(args: I) -> Option<SensorType>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected = None;
    for arg in args {
        let arg = arg.as_ref();
        if arg == "--" {
            break;
        }
        let Some(cluster) = arg.strip_prefix('-') else {
            continue;
        };
        if cluster.is_empty() {
            continue;
        }
        for c in cluster.chars() {
            match FLAGS.iter().find(|(flag, _, _)| *flag == c) {
                Some((_, sensor_type, name)) => {
                    info!("[cli] Use {}", name);
                    selected = Some(*sensor_type);
                }
                None => warn!("[cli] ignoring unknown option -- '{}'", c),
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_flag() {
        assert_eq!(parse_selection(["-a"]), Some(SensorType::Accelerometer));
        assert_eq!(parse_selection(["-m"]), Some(SensorType::MagneticField));
        assert_eq!(parse_selection(["-o"]), Some(SensorType::Orientation));
        assert_eq!(parse_selection(["-p"]), Some(SensorType::Proximity));
        assert_eq!(parse_selection(["-t"]), Some(SensorType::Temperature));
        assert_eq!(parse_selection(["-l"]), Some(SensorType::Light));
        assert_eq!(parse_selection(["-g"]), Some(SensorType::Gyroscope));
    }

    #[test]
    fn test_last_flag_wins() {
        assert_eq!(parse_selection(["-m", "-g", "-a"]), Some(SensorType::Accelerometer));
        assert_eq!(parse_selection(["-lpa", "-t"]), Some(SensorType::Temperature));
    }

    #[test]
    fn test_unknown_flags_and_operands_ignored() {
        assert_eq!(parse_selection(["-x", "file", "-"]), None);
        assert_eq!(parse_selection(["-xg", "extra"]), Some(SensorType::Gyroscope));
        assert_eq!(parse_selection(Vec::<String>::new()), None);
    }

    #[test]
    fn test_double_dash_ends_options() {
        assert_eq!(parse_selection(["-a", "--", "-g"]), Some(SensorType::Accelerometer));
    }
}
