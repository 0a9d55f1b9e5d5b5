//! Visual Studio 2008 to 2005 project downgrade
//!
//! Project (`.vcproj`), C# project (`.csproj`) and solution (`.sln`) files
//! are rewritten line by line into a sibling copy whose stem carries the
//! marker suffix, e.g. `Engine.vcproj` -> `Engine.vc8.vcproj`. Originals are
//! never modified, and files that already carry the marker are skipped so
//! repeated runs don't produce `Engine.vc8.vc8.vcproj`.

use anyhow::Result;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tempfile::NamedTempFile;

use crate::config::{DowngradeConfig, KindConfig};
use crate::error_helpers;
use crate::interrupt::{self, Outcome};
use crate::rules::{Rule, RuleSet};
use crate::walker;

/// The kinds of file the downgrader converts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// C++ project (`.vcproj`)
    Project,
    /// C# project (`.csproj`)
    CsProject,
    /// Solution (`.sln`)
    Solution,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Project, FileKind::CsProject, FileKind::Solution];

    pub fn name(self) -> &'static str {
        match self {
            FileKind::Project => "project",
            FileKind::CsProject => "C# project",
            FileKind::Solution => "solution",
        }
    }

    /// Built-in rule table for this kind
    ///
    /// The solution table rewrites project references to point at the
    /// converted copies, so it follows the configured marker and the
    /// project kinds' source and output extensions.
    pub fn default_rules(self, config: &DowngradeConfig) -> Vec<Rule> {
        let project = [
            Rule::literal(r#"Version="9.00""#, r#"Version="8.00""#),
            // VS2005 has no framework targeting; drop the attribute/element line
            Rule::regex(r"^\s*<?\w*FrameworkVersion\b.*\n?$", ""),
        ];

        match self {
            FileKind::Project => project.to_vec(),
            FileKind::CsProject => {
                let mut rules = project.to_vec();
                rules.push(Rule::literal("MSBuildToolsPath", "MSBuildBinPath"));
                rules
            }
            FileKind::Solution => {
                let mut rules = vec![
                    Rule::literal("Format Version 10.00", "Format Version 9.00"),
                    Rule::literal("# Visual Studio 2008", "# Visual Studio 2005"),
                ];
                for kind in [FileKind::Project, FileKind::CsProject] {
                    rules.push(reference_rule(&config.marker, config.kind(kind)));
                }
                rules
            }
        }
    }
}

/// Rewrite quoted `"X.<ext>"` references to `"X<marker>.<output ext>"`.
/// References that already carry the marker are rewritten to the same name.
fn reference_rule(marker: &str, kind: &KindConfig) -> Rule {
    let output_extension = kind.output_extension.as_deref().unwrap_or(&kind.extension);
    Rule::regex(
        format!(
            r#""([^"]*?)(?:{})?\.{}""#,
            regex::escape(marker),
            regex::escape(&kind.extension)
        ),
        format!(
            r#""${{1}}{}.{}""#,
            marker.replace('$', "$$"),
            output_extension.replace('$', "$$")
        ),
    )
}

struct KindRules {
    kind: FileKind,
    extension: String,
    output_extension: Option<String>,
    rules: RuleSet,
}

/// Totals for one downgrade run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowngradeReport {
    /// (original, converted copy) pairs, in walk order
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// Matching files skipped because they already carry the marker
    pub already_marked: usize,
}

pub struct Downgrader {
    marker: String,
    exclude_dirs: Vec<String>,
    kinds: Vec<KindRules>,
    dry_run: bool,
}

impl Downgrader {
    /// Compile the rule tables for every file kind
    pub fn new(config: &DowngradeConfig) -> Result<Self> {
        let mut kinds = Vec::with_capacity(FileKind::ALL.len());
        for kind in FileKind::ALL {
            let kind_config = config.kind(kind);
            let rules = RuleSet::compile(&config.rules_for(kind))
                .map_err(|e| e.context(format!("Invalid {} rules", kind.name())))?;

            kinds.push(KindRules {
                kind,
                extension: kind_config.extension.clone(),
                output_extension: kind_config.output_extension.clone(),
                rules,
            });
        }

        Ok(Self {
            marker: config.marker.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
            kinds,
            dry_run: false,
        })
    }

    /// Print the conversions without writing anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn rules(&self, kind: FileKind) -> &KindRules {
        // `new` builds one entry per kind in `FileKind::ALL` order
        &self.kinds[kind as usize]
    }

    /// Classify a path by extension. Kinds are mutually exclusive.
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?;
        self.kinds
            .iter()
            .find(|kind| kind.extension == ext)
            .map(|kind| kind.kind)
    }

    /// True if the file stem already ends with the marker
    pub fn is_marked(&self, path: &Path) -> bool {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(&self.marker))
    }

    /// `<dir>/<stem><marker>.<ext>` for `path`, using the mapped extension if set
    pub fn output_path(&self, path: &Path, kind: FileKind) -> PathBuf {
        let kind_rules = self.rules(kind);
        let extension = kind_rules
            .output_extension
            .as_deref()
            .unwrap_or(&kind_rules.extension);

        let mut name: OsString = path.file_stem().map(OsString::from).unwrap_or_default();
        name.push(&self.marker);
        name.push(".");
        name.push(extension);
        path.with_file_name(name)
    }

    /// Apply the rule table for `kind` to a whole file's content
    pub fn convert_bytes(&self, kind: FileKind, content: &[u8]) -> Vec<u8> {
        self.rules(kind).rules.apply_text(content)
    }

    /// Convert `path` into `output`
    ///
    /// The copy is written to a temporary file next to it and renamed into
    /// place, so an I/O failure never leaves a truncated output behind.
    pub fn convert_file(&self, path: &Path, output: &Path, kind: FileKind) -> Result<()> {
        let content = fs::read(path).map_err(|e| {
            let message = error_helpers::io_error(path, "reading", &e);
            anyhow::Error::new(e).context(message)
        })?;

        let converted = self.convert_bytes(kind, &content);

        let write_error = |e: std::io::Error| {
            let message = error_helpers::io_error(output, "writing", &e);
            anyhow::Error::new(e).context(message)
        };

        let parent = output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut temp_file = NamedTempFile::new_in(parent).map_err(write_error)?;
        temp_file.write_all(&converted).map_err(write_error)?;

        // Keep the original's permissions rather than the temp file's 0600
        let permissions = fs::metadata(path)
            .map_err(|e| {
                let message = error_helpers::io_error(path, "reading", &e);
                anyhow::Error::new(e).context(message)
            })?
            .permissions();
        fs::set_permissions(temp_file.path(), permissions).map_err(write_error)?;

        temp_file.persist(output).map_err(|e| write_error(e.error))?;

        tracing::debug!(
            "{} -> {} ({} bytes)",
            path.display(),
            output.display(),
            converted.len()
        );
        Ok(())
    }

    /// Walk `root` and convert every eligible file, announcing each on `out`.
    /// Stops between files once `interrupted` is set.
    pub fn run(
        &self,
        root: &Path,
        interrupted: &AtomicBool,
        out: &mut impl Write,
    ) -> Result<Outcome<DowngradeReport>> {
        let mut report = DowngradeReport::default();
        tracing::info!("Downgrading project files under {}", root.display());

        for entry in walker::walk_files(root, &self.exclude_dirs) {
            if interrupt::is_set(interrupted) {
                tracing::info!("Interrupted after {} conversion(s)", report.converted.len());
                return Ok(Outcome::Interrupted(report));
            }

            let entry = entry?;
            let path = entry.path();

            let Some(kind) = self.classify(path) else {
                continue;
            };

            if self.is_marked(path) {
                tracing::debug!("Skipping converted copy {}", path.display());
                report.already_marked += 1;
                continue;
            }

            let output = self.output_path(path, kind);
            if self.dry_run {
                writeln!(out, "would convert '{}' -> '{}'", path.display(), output.display())?;
            } else {
                writeln!(out, "converting '{}' ...", path.display())?;
                self.convert_file(path, &output, kind)?;
            }

            report.converted.push((path.to_path_buf(), output));
        }

        Ok(Outcome::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn downgrader() -> Downgrader {
        Downgrader::new(&DowngradeConfig::default()).unwrap()
    }

    fn run(root: &Path) -> (Outcome<DowngradeReport>, String) {
        let mut out = Vec::new();
        let flag = AtomicBool::new(false);
        let outcome = downgrader().run(root, &flag, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_classify_is_exclusive() {
        let d = downgrader();
        assert_eq!(d.classify(Path::new("a/Engine.vcproj")), Some(FileKind::Project));
        assert_eq!(d.classify(Path::new("Tool.csproj")), Some(FileKind::CsProject));
        assert_eq!(d.classify(Path::new("All.sln")), Some(FileKind::Solution));
        assert_eq!(d.classify(Path::new("main.cpp")), None);
        assert_eq!(d.classify(Path::new("sln")), None);
    }

    #[test]
    fn test_is_marked() {
        let d = downgrader();
        assert!(d.is_marked(Path::new("Engine.vc8.vcproj")));
        assert!(d.is_marked(Path::new("All.vc8.sln")));
        assert!(!d.is_marked(Path::new("Engine.vcproj")));
        assert!(!d.is_marked(Path::new("vc8.vcproj")));
    }

    #[test]
    fn test_output_path() {
        let d = downgrader();
        assert_eq!(
            d.output_path(Path::new("dir/Engine.vcproj"), FileKind::Project),
            PathBuf::from("dir/Engine.vc8.vcproj")
        );
        assert_eq!(
            d.output_path(Path::new("All.sln"), FileKind::Solution),
            PathBuf::from("All.vc8.sln")
        );
    }

    #[test]
    fn test_output_path_uses_mapped_extension() {
        let mut config = DowngradeConfig::default();
        config.solution.output_extension = Some("vs2005".to_string());
        let d = Downgrader::new(&config).unwrap();
        assert_eq!(
            d.output_path(Path::new("All.sln"), FileKind::Solution),
            PathBuf::from("All.vc8.vs2005")
        );
    }

    #[test]
    fn test_project_rules() {
        let d = downgrader();
        let input = b"Version=\"9.00\"\r\nMinFrameworkVersion=\"5\"\r\n";
        assert_eq!(d.convert_bytes(FileKind::Project, input), b"Version=\"8.00\"\r\n");
    }

    #[test]
    fn test_project_rules_strip_indented_framework_line() {
        let d = downgrader();
        let input = b"<VisualStudioProject\n\tVersion=\"9.00\"\n\tTargetFrameworkVersion=\"131072\"\n\t>\n";
        assert_eq!(
            d.convert_bytes(FileKind::Project, input),
            b"<VisualStudioProject\n\tVersion=\"8.00\"\n\t>\n"
        );
    }

    #[test]
    fn test_csproject_rules() {
        let d = downgrader();
        let input = concat!(
            "  <PropertyGroup>\r\n",
            "    <TargetFrameworkVersion>v2.0</TargetFrameworkVersion>\r\n",
            "  </PropertyGroup>\r\n",
            "  <Import Project=\"$(MSBuildToolsPath)\\Microsoft.CSharp.targets\" />\r\n",
        );
        let expected = concat!(
            "  <PropertyGroup>\r\n",
            "  </PropertyGroup>\r\n",
            "  <Import Project=\"$(MSBuildBinPath)\\Microsoft.CSharp.targets\" />\r\n",
        );
        assert_eq!(
            d.convert_bytes(FileKind::CsProject, input.as_bytes()),
            expected.as_bytes()
        );
    }

    #[test]
    fn test_solution_rules() {
        let d = downgrader();
        let input = concat!(
            "Microsoft Visual Studio Solution File, Format Version 10.00\r\n",
            "# Visual Studio 2008\r\n",
            "Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}\") = \"Foo\", \"Foo\\Foo.vcproj\", \"{1}\"\r\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Tool\", \"Tool.csproj\", \"{2}\"\r\n",
            "Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}\") = \"Bar\", \"Bar.vc8.vcproj\", \"{3}\"\r\n",
        );
        let expected = concat!(
            "Microsoft Visual Studio Solution File, Format Version 9.00\r\n",
            "# Visual Studio 2005\r\n",
            "Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}\") = \"Foo\", \"Foo\\Foo.vc8.vcproj\", \"{1}\"\r\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Tool\", \"Tool.vc8.csproj\", \"{2}\"\r\n",
            "Project(\"{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}\") = \"Bar\", \"Bar.vc8.vcproj\", \"{3}\"\r\n",
        );
        let converted = d.convert_bytes(FileKind::Solution, input.as_bytes());
        assert_eq!(String::from_utf8(converted).unwrap(), expected);
    }

    #[test]
    fn test_run_writes_sibling_copies() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Engine")).unwrap();
        fs::write(root.join("Engine/Engine.vcproj"), "Version=\"9.00\"\n").unwrap();
        fs::write(root.join("All.sln"), "\"Engine\\Engine.vcproj\"\n").unwrap();
        fs::write(root.join("readme.txt"), "Version=\"9.00\"\n").unwrap();

        let (outcome, printed) = run(root);

        assert!(!outcome.is_interrupted());
        assert_eq!(outcome.report().converted.len(), 2);
        assert_eq!(
            fs::read_to_string(root.join("Engine/Engine.vc8.vcproj")).unwrap(),
            "Version=\"8.00\"\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("Engine/Engine.vcproj")).unwrap(),
            "Version=\"9.00\"\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("All.vc8.sln")).unwrap(),
            "\"Engine\\Engine.vc8.vcproj\"\n"
        );
        assert!(!root.join("readme.vc8.txt").exists());
        assert!(printed.contains(&format!(
            "converting '{}' ...",
            root.join("All.sln").display()
        )));
    }

    #[test]
    fn test_run_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("A.vcproj"), "Version=\"9.00\"\n").unwrap();

        run(root);
        let (outcome, _) = run(root);

        assert_eq!(outcome.report().converted.len(), 1);
        assert_eq!(outcome.report().already_marked, 1);
        assert!(!root.join("A.vc8.vc8.vcproj").exists());
    }

    #[test]
    fn test_run_prunes_svn() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".svn/text-base")).unwrap();
        fs::write(root.join(".svn/text-base/A.vcproj"), "Version=\"9.00\"\n").unwrap();

        let (outcome, printed) = run(root);

        assert!(outcome.report().converted.is_empty());
        assert!(printed.is_empty());
        assert!(!root.join(".svn/text-base/A.vc8.vcproj").exists());
    }

    #[test]
    fn test_solution_not_skipped_after_csproj() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("A.csproj"), "<X />\n").unwrap();
        fs::write(root.join("B.sln"), "# Visual Studio 2008\n").unwrap();

        let (outcome, _) = run(root);

        let outputs: Vec<_> = outcome.report().converted.iter().map(|(_, o)| o.clone()).collect();
        assert_eq!(outputs, vec![root.join("A.vc8.csproj"), root.join("B.vc8.sln")]);
        assert_eq!(
            fs::read_to_string(root.join("B.vc8.sln")).unwrap(),
            "# Visual Studio 2005\n"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("A.vcproj"), "Version=\"9.00\"\n").unwrap();

        let mut out = Vec::new();
        let flag = AtomicBool::new(false);
        let outcome = downgrader()
            .with_dry_run(true)
            .run(root, &flag, &mut out)
            .unwrap();

        assert_eq!(outcome.report().converted.len(), 1);
        assert!(!root.join("A.vc8.vcproj").exists());
        assert!(String::from_utf8(out).unwrap().starts_with("would convert"));
    }

    #[test]
    fn test_interrupt_before_start() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("A.vcproj"), "Version=\"9.00\"\n").unwrap();

        let flag = AtomicBool::new(true);
        let outcome = downgrader().run(temp_dir.path(), &flag, &mut Vec::new()).unwrap();

        assert!(outcome.is_interrupted());
        assert!(!temp_dir.path().join("A.vc8.vcproj").exists());
    }

    #[test]
    fn test_custom_marker_and_rules() {
        let mut config = DowngradeConfig::default();
        config.marker = ".old".to_string();
        config.project.rules = Some(vec![Rule::literal("new", "old")]);
        let d = Downgrader::new(&config).unwrap();

        assert_eq!(d.convert_bytes(FileKind::Project, b"new\n"), b"old\n");
        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"\"A.vcproj\"\n"),
            b"\"A.old.vcproj\"\n"
        );
    }

    #[test]
    fn test_solution_references_follow_output_extension() {
        let mut config = DowngradeConfig::default();
        config.project.output_extension = Some("vcproj8".to_string());
        let d = Downgrader::new(&config).unwrap();

        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"Project(\"{X}\") = \"Foo\", \"Foo.vcproj\"\n"),
            b"Project(\"{X}\") = \"Foo\", \"Foo.vc8.vcproj8\"\n"
        );
        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"\"Tool.csproj\"\n"),
            b"\"Tool.vc8.csproj\"\n"
        );
    }

    #[test]
    fn test_converted_solution_points_at_mapped_copies() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("Foo.vcproj"), "Version=\"9.00\"\n").unwrap();
        fs::write(root.join("All.sln"), "Project(\"{X}\") = \"Foo\", \"Foo.vcproj\"\n").unwrap();

        let mut config = DowngradeConfig::default();
        config.project.output_extension = Some("vcproj8".to_string());
        let d = Downgrader::new(&config).unwrap();
        d.run(root, &AtomicBool::new(false), &mut Vec::new()).unwrap();

        let solution = fs::read_to_string(root.join("All.vc8.sln")).unwrap();
        assert!(solution.contains("\"Foo.vc8.vcproj8\""));
        assert!(root.join("Foo.vc8.vcproj8").exists());
    }

    #[test]
    fn test_solution_references_follow_custom_extension() {
        let mut config = DowngradeConfig::default();
        config.project.extension = "vcxproj".to_string();
        let d = Downgrader::new(&config).unwrap();

        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"\"Foo.vcxproj\"\n"),
            b"\"Foo.vc8.vcxproj\"\n"
        );
        // Already-converted references are stable
        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"\"Foo.vc8.vcxproj\"\n"),
            b"\"Foo.vc8.vcxproj\"\n"
        );
        // The old extension is no longer a project reference
        assert_eq!(
            d.convert_bytes(FileKind::Solution, b"\"Foo.vcproj\"\n"),
            b"\"Foo.vcproj\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_stops_at_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("A.vcproj"), "Version=\"9.00\"\n").unwrap();
        std::os::unix::fs::symlink(root.join("gone.vcproj"), root.join("B.vcproj")).unwrap();
        fs::write(root.join("C.vcproj"), "Version=\"9.00\"\n").unwrap();

        let mut out = Vec::new();
        let err = downgrader()
            .run(root, &AtomicBool::new(false), &mut out)
            .unwrap_err();

        assert!(err.to_string().contains("B.vcproj"));
        assert_eq!(
            fs::read_to_string(root.join("A.vc8.vcproj")).unwrap(),
            "Version=\"8.00\"\n"
        );
        assert!(!root.join("B.vc8.vcproj").exists());
        assert!(!root.join("C.vc8.vcproj").exists());
        assert!(String::from_utf8(out).unwrap().contains("B.vcproj"));
    }

    #[test]
    fn test_missing_source_error_names_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("Missing.vcproj");
        let output = temp_dir.path().join("Missing.vc8.vcproj");

        let err = downgrader()
            .convert_file(&source, &output, FileKind::Project)
            .unwrap_err();

        assert!(err.to_string().contains("Missing.vcproj"));
        assert!(!output.exists());
    }
}
