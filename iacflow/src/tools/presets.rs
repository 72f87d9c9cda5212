//! Command templates for the supported tools.
//!
//! Placeholders used here: `stack_dir`, `var_file`, `plan_file`, `currency`,
//! `resource_group`, `location`. Stage inputs supply them.

use super::ToolCommand;
use crate::config::DeploymentScope;

/// `terraform plan` writing a binary plan file.
///
/// `-detailed-exitcode` makes exit code 2 mean "changes present".
#[must_use]
pub fn terraform_plan() -> ToolCommand {
    ToolCommand::new("terraform")
        .args([
            "-chdir={stack_dir}",
            "plan",
            "-input=false",
            "-no-color",
            "-detailed-exitcode",
            "-out={plan_file}",
        ])
        .optional_arg("-var-file={var_file}")
        .with_env("TF_IN_AUTOMATION", "1")
        .with_success_codes([0, 2])
}

/// `terraform apply` of a previously written plan file.
#[must_use]
pub fn terraform_apply() -> ToolCommand {
    ToolCommand::new("terraform")
        .args([
            "-chdir={stack_dir}",
            "apply",
            "-input=false",
            "-no-color",
            "-auto-approve",
            "{plan_file}",
        ])
        .with_env("TF_IN_AUTOMATION", "1")
}

/// `az deployment ... what-if` for a Bicep template in the stack directory.
#[must_use]
pub fn az_what_if(scope: DeploymentScope) -> ToolCommand {
    let cmd = ToolCommand::new("az").args(["deployment", scope.az_subcommand(), "what-if"]);
    let cmd = match scope {
        DeploymentScope::ResourceGroup => cmd.args(["--resource-group", "{resource_group}"]),
        DeploymentScope::Subscription => cmd.args(["--location", "{location}"]),
    };
    cmd.args([
        "--template-file",
        "{stack_dir}/main.bicep",
        "--no-pretty-print",
        "--result-format",
        "ResourceIdOnly",
    ])
    .optional_arg("--parameters=@{var_file}")
}

/// `az deployment ... create` for the same template the what-if previewed.
#[must_use]
pub fn az_deployment_create(scope: DeploymentScope) -> ToolCommand {
    let cmd = ToolCommand::new("az").args(["deployment", scope.az_subcommand(), "create"]);
    let cmd = match scope {
        DeploymentScope::ResourceGroup => cmd.args(["--resource-group", "{resource_group}"]),
        DeploymentScope::Subscription => cmd.args(["--location", "{location}"]),
    };
    cmd.args(["--template-file", "{stack_dir}/main.bicep", "--only-show-errors"])
        .optional_arg("--parameters=@{var_file}")
}

/// `tfsec` in JSON mode. Exit code is always 0; findings decide the result.
#[must_use]
pub fn tfsec() -> ToolCommand {
    ToolCommand::new("tfsec").args(["{stack_dir}", "--format", "json", "--no-colour", "--soft-fail"])
}

/// `checkov` in JSON mode.
#[must_use]
pub fn checkov() -> ToolCommand {
    ToolCommand::new("checkov").args(["-d", "{stack_dir}", "-o", "json", "--quiet", "--soft-fail"])
}

/// `trivy config` in JSON mode.
#[must_use]
pub fn trivy_config() -> ToolCommand {
    ToolCommand::new("trivy").args(["config", "--format", "json", "--exit-code", "0", "{stack_dir}"])
}

/// `infracost breakdown` in JSON mode.
#[must_use]
pub fn infracost_breakdown() -> ToolCommand {
    ToolCommand::new("infracost")
        .args(["breakdown", "--path", "{stack_dir}", "--format", "json", "--no-color"])
        .optional_arg("--terraform-var-file={var_file}")
        .with_env("INFRACOST_CURRENCY", "{currency}")
}

/// `pre-commit run` over the whole repository.
#[must_use]
pub fn pre_commit() -> ToolCommand {
    ToolCommand::new("pre-commit").args([
        "run",
        "--all-files",
        "--show-diff-on-failure",
        "--color",
        "never",
    ])
}
