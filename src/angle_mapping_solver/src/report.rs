//! Problematic-configuration reports.
//!
//! The engine emits these as values; the caller decides where they are
//! written. One report describes a configuration whose strict/nominal/loose
//! classifications disagree and which therefore needs manual review.

use std::fmt;

use brick_core::connection::AngledConnection;

#[derive(Clone, Copy, Debug)]
pub struct ReportAngle {
    pub step: u16,
    pub total_steps: u16,
    pub numerator: i16,
    pub denominator: u16,
    pub radians: f64,
}

#[derive(Clone, Debug)]
pub struct ProblematicReport {
    /// The connection list in canonical form, with representative angles.
    pub connections: Vec<AngledConnection>,
    /// URL-safe name of the visualization file for this configuration.
    pub file_name: String,
    /// Representative steps of the discrete axes.
    pub angles: Vec<ReportAngle>,
    /// Representative value of the analytic last axis, in radians.
    pub last_angle: f64,
    pub m_island_index: usize,
    pub m_island_total: usize,
    pub l_island_total: usize,
    /// Single M-island containing a loop but no L-island; most likely fine.
    pub loop_special_case: bool,
}

impl fmt::Display for ProblematicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Model requires manual verification!")?;
        if self.loop_special_case {
            writeln!(
                f,
                "  Special case for manual verification: Single M-island in S-island. With a loop, but without an L-island."
            )?;
        }
        writeln!(f, "  File: {}", self.file_name)?;
        write!(f, "  Connections:")?;
        for c in &self.connections {
            write!(f, " {c}")?;
        }
        writeln!(f)?;
        writeln!(f, "  Angles: ")?;
        for (i, angle) in self.angles.iter().enumerate() {
            writeln!(
                f,
                "   {}: step {}/{}, fraction {}/{}, radian {}",
                i + 1,
                angle.step,
                angle.total_steps,
                angle.numerator,
                angle.denominator,
                angle.radians
            )?;
        }
        writeln!(f, "   {}: radian {}", self.angles.len() + 1, self.last_angle)?;
        if self.m_island_total > 0 {
            writeln!(
                f,
                "  This model represents M-island {}/{}. There are {} L-islands in this M-island",
                self.m_island_index + 1,
                self.m_island_total,
                self.l_island_total
            )?;
        } else {
            writeln!(f, "  S islands without M-islands inside!")?;
        }
        Ok(())
    }
}
