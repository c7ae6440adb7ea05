//! 实验结果.

use std::io::{self, Write};

use crate::profile::Profile;

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.4}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(
        w,
        "{S4}{:<16} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "phantom", "nominal", "mean", "std", "min", "max", "rel.err", "time(us)"
    )?;
    for r in p.get_records() {
        write!(w, "{S4}{:<16} {:>8.4} ", r.phantom.to_string(), r.nominal)?;
        match &r.outcome {
            Ok(s) => write!(
                w,
                "{:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8} ",
                s.mean,
                s.std,
                s.min,
                s.max,
                f64_to_display(r.relative_error())
            )?,
            Err(e) => write!(w, "{:<44} ", e.to_string())?,
        }
        writeln!(w, "{:>10}", r.time.as_micros())?;
    }
    writeln!(
        w,
        "{S4}Average |rel.err|: {}",
        f64_to_display(p.get_avg_abs_error())
    )?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_target_time_us())?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros());
    write!(
        w,
        "{S4}Most time-consuming task costs {} us",
        t.map_or_else(|| "/".to_string(), |t| t.to_string())
    )?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果, 输出到标准输出.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        utils::sep_to(&mut out)?;
        let mut buf = Vec::with_capacity(2048);

        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut buf)?;
            out.write_all(&buf)?;
            writeln!(out)?;
            buf.clear();

            utils::sep_to(&mut out)?;
        }
        Ok(())
    }
}
