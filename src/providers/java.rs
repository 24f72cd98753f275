use super::Provider;
use crate::generate::{GenerateContext, MISE_STEP_NAME};
use crate::plan::{Command, Input};
use anyhow::Result;
use regex::Regex;

const DEFAULT_JDK_VERSION: &str = "21";
const DEFAULT_GRADLE_VERSION: &str = "8";
const GRADLE_CACHE_KEY: &str = "gradle";
const MAVEN_CACHE_KEY: &str = "maven";

#[derive(Debug, Default)]
pub struct JavaProvider;

impl Provider for JavaProvider {
    fn name(&self) -> &'static str {
        "java"
    }

    fn detect(&self, ctx: &GenerateContext) -> Result<bool> {
        Ok(ctx.app.has_match("pom.xml")
            || ctx.app.has_match("gradlew")
            || ctx.app.has_match("build.gradle")
            || ctx.app.has_match("build.gradle.kts"))
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()> {
        ctx.default_mise_package("java", DEFAULT_JDK_VERSION);

        if self.uses_gradle(ctx) {
            self.set_gradle_version(ctx)?;
            self.plan_gradle(ctx);
        } else {
            self.plan_maven(ctx);
        }

        Ok(())
    }

    fn start_command_help(&self) -> &'static str {
        "The built jar under build/libs (Gradle) or target (Maven) is run with java -jar"
    }
}

impl JavaProvider {
    fn uses_gradle(&self, ctx: &GenerateContext) -> bool {
        ctx.app.has_match("gradlew")
            || ctx.app.has_match("build.gradle")
            || ctx.app.has_match("build.gradle.kts")
    }

    fn plan_gradle(&self, ctx: &mut GenerateContext) {
        let gradle_cache = ctx.caches.add_cache(GRADLE_CACHE_KEY, "/root/.gradle");
        let mise_outputs = ctx.get_mise_step_builder().get_output_paths();

        let build_cmd = if ctx.app.has_match("gradlew") {
            "./gradlew clean build -x check"
        } else {
            "gradle clean build -x check"
        };

        let mut build = ctx.new_command_step("build");
        build.add_input(Input::step(MISE_STEP_NAME));
        build.add_command(Command::copy("."));
        build.add_command(Command::exec_with_caches(
            build_cmd,
            None,
            vec![gradle_cache],
        ));
        let build_name = build.name().to_string();
        ctx.add_step(build);

        ctx.deploy.inputs = vec![
            ctx.default_runtime_input(),
            Input::step_filtered(MISE_STEP_NAME, Some(mise_outputs), None),
            Input::step_filtered(build_name, Some(vec![".".to_string()]), None),
        ];

        let port_config = get_gradle_port_config(&self.read_build_gradle(ctx));
        ctx.deploy.start_cmd = if port_config.is_empty() {
            "java $JAVA_OPTS -jar build/libs/*.jar".to_string()
        } else {
            format!("java $JAVA_OPTS {port_config} -jar build/libs/*.jar")
        };
    }

    fn plan_maven(&self, ctx: &mut GenerateContext) {
        if !ctx.app.has_match("mvnw") {
            ctx.default_mise_package("maven", "latest");
        }

        let maven_cache = ctx.caches.add_cache(MAVEN_CACHE_KEY, "/root/.m2");
        let mise_outputs = ctx.get_mise_step_builder().get_output_paths();

        let build_cmd = if ctx.app.has_match("mvnw") {
            "./mvnw -DskipTests clean package"
        } else {
            "mvn -DskipTests clean package"
        };

        let mut build = ctx.new_command_step("build");
        build.add_input(Input::step(MISE_STEP_NAME));
        build.add_command(Command::copy("."));
        build.add_command(Command::exec_with_caches(build_cmd, None, vec![maven_cache]));
        let build_name = build.name().to_string();
        ctx.add_step(build);

        ctx.deploy.inputs = vec![
            ctx.default_runtime_input(),
            Input::step_filtered(MISE_STEP_NAME, Some(mise_outputs), None),
            Input::step_filtered(build_name, Some(vec![".".to_string()]), None),
        ];

        ctx.deploy.start_cmd = "java $JAVA_OPTS -jar target/*.jar".to_string();
    }

    fn set_gradle_version(&self, ctx: &mut GenerateContext) -> Result<()> {
        let gradle = ctx.default_mise_package("gradle", DEFAULT_GRADLE_VERSION);

        if let Some(env_version) = ctx.env.get_config_variable("GRADLE_VERSION") {
            let env_version = env_version.to_string();
            ctx.resolver.version(&gradle, &env_version, "GRADLE_VERSION");
        }

        if !ctx.app.has_match("gradle/wrapper/gradle-wrapper.properties") {
            return Ok(());
        }

        let wrapper_props = ctx
            .app
            .read_file("gradle/wrapper/gradle-wrapper.properties")?;

        if let Some(version) = parse_gradle_wrapper_version(&wrapper_props) {
            ctx.resolver
                .version(&gradle, &version, "gradle-wrapper.properties");
        }

        Ok(())
    }

    fn read_build_gradle(&self, ctx: &GenerateContext) -> String {
        let file_path = if ctx.app.has_match("build.gradle") {
            "build.gradle"
        } else {
            "build.gradle.kts"
        };
        ctx.app.read_file(file_path).unwrap_or_default()
    }
}

/// The major version of the distribution pinned by the Gradle wrapper.
fn parse_gradle_wrapper_version(wrapper_props: &str) -> Option<String> {
    let version_regex = Regex::new(r"(distributionUrl[\S].*gradle)(-)([0-9|.]*)").ok()?;
    let custom_version = version_regex.captures(wrapper_props)?.get(3)?.as_str();

    let parse_version_regex =
        Regex::new(r#"^(?:[\sa-zA-Z"'-]*)(\d*)(?:\.*)(\d*)(?:\.*\d*)(?:["']?)$"#).ok()?;
    let major = parse_version_regex
        .captures(custom_version)?
        .get(1)?
        .as_str();

    if major.is_empty() {
        None
    } else {
        Some(major.to_string())
    }
}

fn is_using_spring_boot(build_gradle: &str) -> bool {
    build_gradle.contains("org.springframework.boot:spring-boot")
        || build_gradle.contains("spring-boot-gradle-plugin")
        || build_gradle.contains("org.springframework.boot")
        || build_gradle.contains("org.grails:grails-")
}

fn get_gradle_port_config(build_gradle: &str) -> &'static str {
    if is_using_spring_boot(build_gradle) {
        "-Dserver.port=$PORT"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Environment, MockFileSystem};
    use crate::config::Config;
    use crate::resolver::StaticVersionOracle;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn context(files: &[(&str, &str)], env: &[(&str, &str)]) -> GenerateContext {
        let mut fs = MockFileSystem::new();
        for (path, contents) in files {
            fs.add_file(*path, *contents);
        }
        let app = App::from_fs(Arc::new(fs)).unwrap();
        let env = Environment::new(
            env.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        GenerateContext::new(
            app,
            env,
            Config::new(),
            Box::new(
                StaticVersionOracle::new()
                    .with("java", "21.0.5")
                    .with("gradle", "8.12")
                    .with("maven", "3.9.9"),
            ),
        )
    }

    #[test]
    fn test_detects_gradle_and_maven() {
        assert!(JavaProvider
            .detect(&context(&[("build.gradle", "")], &[]))
            .unwrap());
        assert!(JavaProvider
            .detect(&context(&[("pom.xml", "<project/>")], &[]))
            .unwrap());
        assert!(!JavaProvider.detect(&context(&[], &[])).unwrap());
    }

    #[test]
    fn test_parse_gradle_wrapper_version() {
        let props = "distributionUrl=https\\://services.gradle.org/distributions/gradle-8.5-bin.zip";
        assert_eq!(parse_gradle_wrapper_version(props), Some("8".to_string()));

        assert_eq!(parse_gradle_wrapper_version("no url here"), None);
    }

    #[test]
    fn test_wrapper_version_beats_env_override() {
        let mut ctx = context(
            &[
                ("gradlew", ""),
                (
                    "gradle/wrapper/gradle-wrapper.properties",
                    "distributionUrl=https\\://services.gradle.org/distributions/gradle-7.6-bin.zip",
                ),
            ],
            &[("RAILPACK_GRADLE_VERSION", "9")],
        );
        JavaProvider.plan(&mut ctx).unwrap();

        let requested = ctx.resolver.get("gradle").unwrap();
        assert_eq!(requested.version, "7");
        assert_eq!(requested.source, "gradle-wrapper.properties");
    }

    #[test]
    fn test_spring_boot_port_config() {
        let mut ctx = context(
            &[
                ("gradlew", ""),
                (
                    "build.gradle",
                    "dependencies { implementation 'org.springframework.boot:spring-boot-starter-web' }",
                ),
            ],
            &[],
        );
        JavaProvider.plan(&mut ctx).unwrap();
        assert!(ctx.deploy.start_cmd.contains("-Dserver.port=$PORT"));
    }

    #[test]
    fn test_maven_plan() {
        let mut ctx = context(&[("pom.xml", "<project/>")], &[]);
        JavaProvider.plan(&mut ctx).unwrap();

        let (plan, resolved) = ctx.generate().unwrap();
        let build = plan.get_step("build").unwrap();
        assert!(build
            .commands
            .iter()
            .any(|c| matches!(c, Command::Exec { cmd, .. } if cmd.starts_with("mvn "))));
        assert!(resolved.contains_key("maven"));
        assert_eq!(plan.deploy.start_cmd, "java $JAVA_OPTS -jar target/*.jar");
    }
}
