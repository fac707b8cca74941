//! Batch script generation for render jobs.

use crate::RenderUnit;

/// Template for the Slurm batch script submitted for each render unit.
///
/// The header is fixed per run; only the frame bounds change between units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    /// Scheduler partition (queue).
    pub partition: String,
    /// Wall-clock limit in Slurm `--time` syntax.
    pub time_limit: String,
    /// Environment module providing the renderer.
    pub module: String,
    /// Scene name; the renderer reads `{scene}.ini`.
    pub scene: String,
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self {
            partition: "plgrid".to_string(),
            time_limit: "02:00".to_string(),
            module: "pov-ray".to_string(),
            scene: "planet_00ani".to_string(),
        }
    }
}

impl ScriptTemplate {
    /// Builder method to set the partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Builder method to set the wall-clock limit.
    pub fn with_time_limit(mut self, time_limit: impl Into<String>) -> Self {
        self.time_limit = time_limit.into();
        self
    }

    /// Builder method to set the scene.
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = scene.into();
        self
    }

    /// Render the script for frames `start_frame..=end_frame`.
    pub fn build(&self, start_frame: u32, end_frame: u32) -> String {
        format!(
            "#!/bin/bash\n\
             #SBATCH -p {partition}\n\
             #SBATCH --time={time}\n\
             module add {module}\n\
             povray Subset_Start_Frame={start_frame} Subset_End_Frame={end_frame} {scene}.ini",
            partition = self.partition,
            time = self.time_limit,
            module = self.module,
            scene = self.scene,
        )
    }

    /// Render the script for a unit.
    pub fn build_for(&self, unit: &RenderUnit) -> String {
        self.build(unit.start_frame, unit.end_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script() {
        let script = ScriptTemplate::default().build(1, 2);
        assert_eq!(
            script,
            "#!/bin/bash\n#SBATCH -p plgrid\n#SBATCH --time=02:00\nmodule add pov-ray\n\
             povray Subset_Start_Frame=1 Subset_End_Frame=2 planet_00ani.ini"
        );
    }

    #[test]
    fn test_only_invocation_line_varies() {
        let template = ScriptTemplate::default();
        let a = template.build(1, 2);
        let b = template.build(3, 4);

        let header_a: Vec<&str> = a.lines().take(4).collect();
        let header_b: Vec<&str> = b.lines().take(4).collect();
        assert_eq!(header_a, header_b);
        assert!(b.ends_with("Subset_Start_Frame=3 Subset_End_Frame=4 planet_00ani.ini"));
    }

    #[test]
    fn test_custom_template() {
        let unit = RenderUnit::for_iteration(3).unwrap();
        let script = ScriptTemplate::default()
            .with_partition("plgrid-testing")
            .with_time_limit("10:00")
            .with_scene("galaxy")
            .build_for(&unit);

        assert!(script.contains("#SBATCH -p plgrid-testing\n"));
        assert!(script.contains("#SBATCH --time=10:00\n"));
        assert!(script.ends_with("Subset_Start_Frame=5 Subset_End_Frame=6 galaxy.ini"));
    }
}
