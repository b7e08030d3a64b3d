use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use grafsim_core::diagram::{Diagram, Variable};

use crate::expr::{is_well_formed, parens_balanced, Condition};
use crate::graph::{GraphIndex, NodeKind};

fn step_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^X(\d+)(\.t)?$").expect("valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NoInitialStep,
    UnreachableStep,
    DeadEndStep,
    NoReturnPath,
    TransitionWithoutUpstream,
    TransitionWithoutDownstream,
    EmptyCondition,
    UnbalancedParentheses,
    MalformedCondition,
    UndefinedVariable,
    UndefinedAction,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::NoInitialStep | IssueKind::UnreachableStep | IssueKind::MalformedCondition => {
                Severity::Error
            }
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl Issue {
    fn new(kind: IssueKind, element_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            element_id: element_id.map(str::to_string),
            suggested_fix: None,
        }
    }

    fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub issues: Vec<Issue>,
}

impl AnalysisReport {
    /// True when no error-level issue was found.
    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    /// Like [`AnalysisReport::passed`], with warnings counted as failures too.
    pub fn passed_strict(&self) -> bool {
        self.error_count() == 0 && self.warning_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);
        for issue in issues {
            match &issue.element_id {
                Some(id) => out.push_str(&format!("[{}] {}: {}\n", issue.severity, id, issue.message)),
                None => out.push_str(&format!("[{}] {}\n", issue.severity, issue.message)),
            }
            if let Some(fix) = &issue.suggested_fix {
                out.push_str(&format!("    fix: {}\n", fix));
            }
        }
        out.push_str(&format!(
            "{} error(s), {} warning(s)\n",
            self.error_count(),
            self.warning_count()
        ));
        out
    }
}

/// Static structural and condition checks over a diagram.
pub struct Analyzer {
    variable_names: HashSet<String>,
    action_names: HashSet<String>,
}

impl Analyzer {
    pub fn new(variables: &[Variable]) -> Self {
        Self {
            variable_names: variables.iter().map(|v| v.name.clone()).collect(),
            action_names: HashSet::new(),
        }
    }

    /// Declare output names that step actions may drive, in addition to
    /// the variables.
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_names.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn analyze(&self, diagram: &Diagram) -> AnalysisReport {
        let index = GraphIndex::new(diagram);
        let mut issues = Vec::new();

        self.check_structure(diagram, &index, &mut issues);
        self.check_conditions(diagram, &mut issues);
        self.check_actions(diagram, &mut issues);

        let report = AnalysisReport { issues };
        debug!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "Diagram analysed"
        );
        report
    }

    fn check_structure(&self, diagram: &Diagram, index: &GraphIndex, issues: &mut Vec<Issue>) {
        let mut fed_steps: BTreeSet<usize> = BTreeSet::new();
        let mut feeding_steps: BTreeSet<usize> = BTreeSet::new();
        // (upstream steps, downstream steps) per transition node.
        let mut arcs: Vec<(BTreeSet<usize>, BTreeSet<usize>)> = Vec::new();

        for t in &diagram.transitions {
            let Some(idx) = index
                .index_of(&t.id)
                .filter(|&i| index.kind(i) == NodeKind::Transition)
            else {
                continue;
            };
            let upstream = index.upstream_step_nodes(idx);
            let downstream = index.downstream_step_nodes(idx);
            if upstream.is_empty() {
                issues.push(
                    Issue::new(
                        IssueKind::TransitionWithoutUpstream,
                        Some(&t.id),
                        "transition has no upstream step and can never fire",
                    )
                    .with_fix(format!("Connect a step into transition '{}'", t.id)),
                );
            }
            if downstream.is_empty() {
                issues.push(
                    Issue::new(
                        IssueKind::TransitionWithoutDownstream,
                        Some(&t.id),
                        "transition has no downstream step",
                    )
                    .with_fix(format!("Connect transition '{}' to the step it activates", t.id)),
                );
            }
            feeding_steps.extend(upstream.iter().copied());
            fed_steps.extend(downstream.iter().copied());
            arcs.push((upstream, downstream));
        }

        let initial: Vec<usize> = diagram
            .initial_steps()
            .filter_map(|s| index.index_of(&s.id))
            .collect();
        if initial.is_empty() && !diagram.steps.is_empty() {
            issues.push(
                Issue::new(IssueKind::NoInitialStep, None, "diagram has no initial step")
                    .with_fix("Mark the first step of the sequence as initial"),
            );
        }

        let mut reached: HashSet<usize> = initial.iter().copied().collect();
        let mut queue: VecDeque<usize> = initial.iter().copied().collect();
        while let Some(step) = queue.pop_front() {
            for (upstream, downstream) in &arcs {
                if !upstream.contains(&step) {
                    continue;
                }
                for &next in downstream {
                    if reached.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        for step in &diagram.steps {
            let Some(idx) = index.index_of(&step.id).filter(|&i| index.kind(i) == NodeKind::Step)
            else {
                continue;
            };
            let name = step.display_name();
            if !initial.is_empty() && !reached.contains(&idx) {
                issues.push(
                    Issue::new(
                        IssueKind::UnreachableStep,
                        Some(&step.id),
                        format!("step '{}' is unreachable from the initial steps", name),
                    )
                    .with_fix(format!("Add a transition path from an active step to '{}'", name)),
                );
            }
            if !feeding_steps.contains(&idx) {
                issues.push(
                    Issue::new(
                        IssueKind::DeadEndStep,
                        Some(&step.id),
                        format!("step '{}' has no outgoing transition", name),
                    )
                    .with_fix(format!("Add a transition after step '{}'", name)),
                );
            }
            if step.is_initial() && !fed_steps.contains(&idx) {
                issues.push(
                    Issue::new(
                        IssueKind::NoReturnPath,
                        Some(&step.id),
                        format!("initial step '{}' is never re-activated", name),
                    )
                    .with_fix(format!("Add a transition from the final step back to '{}'", name)),
                );
            }
        }
    }

    fn check_conditions(&self, diagram: &Diagram, issues: &mut Vec<Issue>) {
        let step_numbers: HashSet<u32> = diagram.steps.iter().map(|s| s.number).collect();

        for t in &diagram.transitions {
            let condition = Condition::parse(t.condition.as_str());
            if condition.is_empty() {
                issues.push(Issue::new(
                    IssueKind::EmptyCondition,
                    Some(&t.id),
                    "condition is empty and never holds",
                ));
                continue;
            }
            if !parens_balanced(condition.source()) {
                issues.push(Issue::new(
                    IssueKind::UnbalancedParentheses,
                    Some(&t.id),
                    format!("unbalanced parentheses in `{}`", condition.source()),
                ));
            }
            if !is_well_formed(condition.rpn()) {
                issues.push(Issue::new(
                    IssueKind::MalformedCondition,
                    Some(&t.id),
                    format!(
                        "`{}` does not reduce to a single value (rpn: {})",
                        condition.source(),
                        condition.rpn_string()
                    ),
                ));
            }
            for name in condition.variables() {
                if self.is_defined(name, &step_numbers) {
                    continue;
                }
                issues.push(
                    Issue::new(
                        IssueKind::UndefinedVariable,
                        Some(&t.id),
                        format!("undefined variable `{}`", name),
                    )
                    .with_fix(format!("Define variable '{}'", name)),
                );
            }
        }
    }

    fn check_actions(&self, diagram: &Diagram, issues: &mut Vec<Issue>) {
        for step in &diagram.steps {
            for action in &step.actions {
                let name = action.variable.as_str();
                if name.is_empty()
                    || self.action_names.contains(name)
                    || self.variable_names.contains(name)
                {
                    continue;
                }
                issues.push(
                    Issue::new(
                        IssueKind::UndefinedAction,
                        Some(&step.id),
                        format!("action `{}` in step '{}' is not defined", name, step.display_name()),
                    )
                    .with_fix(format!("Define action '{}'", name)),
                );
            }
        }
    }

    fn is_defined(&self, name: &str, step_numbers: &HashSet<u32>) -> bool {
        if self.variable_names.contains(name) {
            return true;
        }
        step_var_re()
            .captures(name)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .is_some_and(|n| step_numbers.contains(&n))
    }
}
