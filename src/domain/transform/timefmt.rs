use chrono::{DateTime, NaiveDateTime};

pub const SLURM_BEGIN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const PBS_BEGIN_FORMAT: &str = "%Y%m%d%H%M.%S";
pub const LSF_BEGIN_FORMAT: &str = "%Y:%m:%d:%H:%M";
pub const FLUX_BEGIN_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn ceil_div(value: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return value;
    }
    value.div_ceil(divisor)
}

fn parse_number(text: &str) -> Result<u64, String> {
    text.trim().parse::<u64>().map_err(|_| format!("'{}' is not a non-negative integer", text))
}

/// Sums `(value, unit)` pairs into seconds, rejecting totals past `u64::MAX`.
fn clock_seconds(text: &str, parts: &[(u64, u64)]) -> Result<u64, String> {
    parts
        .iter()
        .try_fold(0u64, |total, &(value, unit)| value.checked_mul(unit).and_then(|seconds| total.checked_add(seconds)))
        .ok_or_else(|| format!("'{}' is out of range", text.trim()))
}

/// Flux standard duration: `90s`, `30m`, `2h`, `1.5d`. A bare number is seconds.
pub fn parse_fsd(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let (number, multiplier) = match text.chars().last() {
        Some('s') => (&text[..text.len() - 1], 1.0),
        Some('m') => (&text[..text.len() - 1], 60.0),
        Some('h') => (&text[..text.len() - 1], 3600.0),
        Some('d') => (&text[..text.len() - 1], 86400.0),
        _ => (text, 1.0),
    };

    let value: f64 = number.parse().map_err(|_| format!("'{}' is not a duration", text))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("'{}' is not a duration", text));
    }
    let seconds = (value * multiplier).round();
    if seconds >= u64::MAX as f64 {
        return Err(format!("'{}' is out of range", text));
    }
    Ok(seconds as u64)
}

/// The largest whole unit that represents `seconds` exactly.
pub fn format_fsd(seconds: u64) -> String {
    if seconds > 0 && seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds > 0 && seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Slurm accepts `M`, `M:S`, `H:M:S`, `D-H`, `D-H:M` and `D-H:M:S`.
pub fn parse_slurm_time(text: &str) -> Result<u64, String> {
    let trimmed = text.trim();

    if let Some((days, rest)) = trimmed.split_once('-') {
        let days = parse_number(days)?;
        let parts: Vec<&str> = rest.split(':').collect();
        let (hours, minutes, seconds) = match parts.as_slice() {
            [h] => (parse_number(h)?, 0, 0),
            [h, m] => (parse_number(h)?, parse_number(m)?, 0),
            [h, m, s] => (parse_number(h)?, parse_number(m)?, parse_number(s)?),
            _ => return Err(format!("'{}' is not a slurm time", trimmed)),
        };
        return clock_seconds(text, &[(days, 86400), (hours, 3600), (minutes, 60), (seconds, 1)]);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    match parts.as_slice() {
        [m] => clock_seconds(text, &[(parse_number(m)?, 60)]),
        [m, s] => clock_seconds(text, &[(parse_number(m)?, 60), (parse_number(s)?, 1)]),
        [h, m, s] => clock_seconds(text, &[(parse_number(h)?, 3600), (parse_number(m)?, 60), (parse_number(s)?, 1)]),
        _ => Err(format!("'{}' is not a slurm time", trimmed)),
    }
}

/// `[D-]HH:MM:SS`
pub fn format_slurm_time(seconds: u64) -> String {
    let days = seconds / 86400;
    let rest = seconds % 86400;
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    if days > 0 { format!("{}-{}", days, clock) } else { clock }
}

/// PBS walltime: `HH:MM:SS`, `MM:SS` or plain seconds.
pub fn parse_pbs_time(text: &str) -> Result<u64, String> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    match parts.as_slice() {
        [s] => parse_number(s),
        [m, s] => clock_seconds(text, &[(parse_number(m)?, 60), (parse_number(s)?, 1)]),
        [h, m, s] => clock_seconds(text, &[(parse_number(h)?, 3600), (parse_number(m)?, 60), (parse_number(s)?, 1)]),
        _ => Err(format!("'{}' is not a walltime", text)),
    }
}

/// `HH:MM:SS`, hours may exceed 24.
pub fn format_pbs_time(seconds: u64) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Cobalt wall time: `HH:MM:SS` or minutes.
pub fn parse_cobalt_time(text: &str) -> Result<u64, String> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    match parts.as_slice() {
        [m] => clock_seconds(text, &[(parse_number(m)?, 60)]),
        [h, m, s] => clock_seconds(text, &[(parse_number(h)?, 3600), (parse_number(m)?, 60), (parse_number(s)?, 1)]),
        _ => Err(format!("'{}' is not a wall time", text)),
    }
}

/// LSF run limit: `HH:MM` or minutes.
pub fn parse_lsf_time(text: &str) -> Result<u64, String> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    match parts.as_slice() {
        [m] => clock_seconds(text, &[(parse_number(m)?, 60)]),
        [h, m] => clock_seconds(text, &[(parse_number(h)?, 3600), (parse_number(m)?, 60)]),
        _ => Err(format!("'{}' is not a run limit", text)),
    }
}

/// `HH:MM`, rounded up to whole minutes.
pub fn format_lsf_time(seconds: u64) -> String {
    let minutes = ceil_div(seconds, 60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Formats epoch seconds (UTC) with a strftime pattern.
pub fn format_epoch(epoch: i64, pattern: &str) -> Option<String> {
    DateTime::from_timestamp(epoch, 0).map(|time| time.format(pattern).to_string())
}

/// Parses a UTC timestamp written with a strftime pattern into epoch seconds.
pub fn parse_epoch(text: &str, pattern: &str) -> Result<i64, String> {
    NaiveDateTime::parse_from_str(text.trim(), pattern)
        .map(|time| time.and_utc().timestamp())
        .map_err(|e| format!("'{}' does not match {}: {}", text, pattern, e))
}

/// Memory size in megabytes from `512`, `512M`, `4G`, `4gb` or `1T`. A bare number is megabytes.
pub fn parse_memory_mb(text: &str) -> Result<u64, String> {
    let lowered = text.trim().to_ascii_lowercase();
    let number = lowered.strip_suffix('b').unwrap_or(&lowered);
    let (digits, unit) = match number.chars().last() {
        Some('k') => (&number[..number.len() - 1], 0),
        Some('m') => (&number[..number.len() - 1], 1),
        Some('g') => (&number[..number.len() - 1], 1024),
        Some('t') => (&number[..number.len() - 1], 1024 * 1024),
        _ => (number, 1),
    };
    let value = parse_number(digits).map_err(|_| format!("'{}' is not a memory size", text.trim()))?;
    if unit == 0 {
        return Ok(ceil_div(value, 1024));
    }
    value.checked_mul(unit).ok_or_else(|| format!("'{}' is out of range", text.trim()))
}

/// `4G` when the size is whole gigabytes, `512M` otherwise.
pub fn format_memory(megabytes: u64) -> String {
    if megabytes > 0 && megabytes % 1024 == 0 {
        format!("{}G", megabytes / 1024)
    } else {
        format!("{}M", megabytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsd() {
        assert_eq!(parse_fsd("30m"), Ok(1800));
        assert_eq!(parse_fsd("1.5h"), Ok(5400));
        assert_eq!(parse_fsd("45"), Ok(45));
        assert!(parse_fsd("soon").is_err());
        assert_eq!(format_fsd(7200), "2h");
        assert_eq!(format_fsd(90), "90s");
    }

    #[test]
    fn test_slurm_time() {
        assert_eq!(parse_slurm_time("1-02:03:04"), Ok(93784));
        assert_eq!(parse_slurm_time("30"), Ok(1800));
        assert_eq!(parse_slurm_time("01:00:00"), Ok(3600));
        assert_eq!(format_slurm_time(93784), "1-02:03:04");
        assert_eq!(format_slurm_time(3600), "01:00:00");
    }

    #[test]
    fn test_pbs_and_lsf_time() {
        assert_eq!(format_pbs_time(93784), "26:03:04");
        assert_eq!(parse_pbs_time("26:03:04"), Ok(93784));
        assert_eq!(format_lsf_time(3601), "01:01");
        assert_eq!(parse_lsf_time("01:30"), Ok(5400));
        assert_eq!(parse_cobalt_time("90"), Ok(5400));
        assert_eq!(parse_cobalt_time("01:30:00"), Ok(5400));
    }

    #[test]
    fn test_oversized_times_are_errors() {
        assert!(parse_slurm_time("999999999999999-0").unwrap_err().contains("out of range"));
        assert!(parse_slurm_time("18446744073709551615").unwrap_err().contains("out of range"));
        assert!(parse_pbs_time("18446744073709551615:00:00").unwrap_err().contains("out of range"));
        assert!(parse_lsf_time("18446744073709551615").unwrap_err().contains("out of range"));
        assert!(parse_fsd("1e300d").unwrap_err().contains("out of range"));
        assert_eq!(parse_pbs_time("18446744073709551615"), Ok(u64::MAX));
    }

    #[test]
    fn test_memory_sizes() {
        assert_eq!(parse_memory_mb("4G"), Ok(4096));
        assert_eq!(parse_memory_mb("4gb"), Ok(4096));
        assert_eq!(parse_memory_mb("512"), Ok(512));
        assert_eq!(parse_memory_mb("2048k"), Ok(2));
        assert!(parse_memory_mb("lots").is_err());
        assert!(parse_memory_mb("99999999999999999T").unwrap_err().contains("out of range"));
        assert_eq!(format_memory(4096), "4G");
        assert_eq!(format_memory(1536), "1536M");
    }

    #[test]
    fn test_epoch_formats() {
        let epoch = 1767270600; // 2026-01-01 12:30:00 UTC
        assert_eq!(format_epoch(epoch, SLURM_BEGIN_FORMAT).as_deref(), Some("2026-01-01T12:30:00"));
        assert_eq!(format_epoch(epoch, PBS_BEGIN_FORMAT).as_deref(), Some("202601011230.00"));
        assert_eq!(format_epoch(epoch, LSF_BEGIN_FORMAT).as_deref(), Some("2026:01:01:12:30"));
        assert_eq!(parse_epoch("2026-01-01T12:30:00Z", FLUX_BEGIN_FORMAT), Ok(epoch));
        assert_eq!(parse_epoch("202601011230.00", PBS_BEGIN_FORMAT), Ok(epoch));
    }
}
