//! Correlation / risk chains (C7, spec §4.6): post-processes a Kubernetes
//! finding set into named risk chains and multi-layer attack paths. Catalog
//! entries are static data describing which rule IDs must each have at
//! least one supporting finding before the chain/path fires — no clock, no
//! I/O, a pure function of the finding set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::inventory::finding::Finding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskChain {
    pub name: String,
    pub score: u32,
    pub reason: String,
    pub finding_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPath {
    pub name: String,
    pub score: u32,
    pub description: String,
    pub layers: Vec<String>,
    pub finding_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Correlation {
    pub risk_chains: Vec<RiskChain>,
    pub attack_paths: Vec<AttackPath>,
}

/// One layer of an attack path, or one member of a risk chain: a set of
/// acceptable rule IDs (alternate rule-id spellings for the same control,
/// e.g. `K8S_PRIVILEGED_CONTAINER`/`K8S_POD_PRIVILEGED_CONTAINER`), any one
/// of which supplies the layer.
struct RuleGroup(&'static [&'static str]);

struct AttackPathDescriptor {
    name: &'static str,
    score: u32,
    description: &'static str,
    layers: &'static [(&'static str, RuleGroup)],
}

struct ChainDescriptor {
    name: &'static str,
    score: u32,
    reason: &'static str,
    members: &'static [RuleGroup],
}

static ATTACK_PATH_CATALOG: &[AttackPathDescriptor] = &[
    AttackPathDescriptor {
        name: "Privileged Pod to Node Compromise",
        score: 98,
        description: "A privileged container with host namespace access and no seccomp profile gives an attacker a direct path to node compromise.",
        layers: &[
            ("Privileged container", RuleGroup(&["K8S_PRIVILEGED_CONTAINER", "K8S_POD_PRIVILEGED_CONTAINER"])),
            ("Host namespace access", RuleGroup(&["K8S_POD_HOST_NETWORK", "K8S_POD_HOST_PID_OR_IPC"])),
            ("No Seccomp profile", RuleGroup(&["K8S_POD_NO_SECCOMP"])),
            ("Node compromise", RuleGroup(&["K8S_PRIVILEGED_CONTAINER", "K8S_POD_PRIVILEGED_CONTAINER"])),
        ],
    },
    AttackPathDescriptor {
        name: "Public Endpoint to Cluster Admin",
        score: 92,
        description: "A wide-open EKS API endpoint combined with an overpermissive node role and no IRSA boundary lets an external caller reach cluster-administrative access.",
        layers: &[
            ("Public EKS endpoint", RuleGroup(&["EKS_PUBLIC_ENDPOINT_WIDE_OPEN", "EKS_PUBLIC_ENDPOINT_ENABLED"])),
            ("No IRSA binding", RuleGroup(&["EKS_SERVICEACCOUNT_NO_IRSA"])),
            ("Overpermissive node role", RuleGroup(&["EKS_NODE_ROLE_OVERPERMISSIVE"])),
            ("Cluster administrative access", RuleGroup(&["EKS_NODE_ROLE_OVERPERMISSIVE"])),
        ],
    },
    AttackPathDescriptor {
        name: "Exposed Service to Data Exfiltration",
        score: 90,
        description: "A publicly reachable LoadBalancer service, a default service account with an automounted token, and no Pod Security Admission boundary together allow data exfiltration from an exposed workload.",
        layers: &[
            ("Public LoadBalancer service", RuleGroup(&["K8S_SERVICE_PUBLIC_LOADBALANCER"])),
            (
                "Default service account automount",
                RuleGroup(&["K8S_DEFAULT_SERVICEACCOUNT_USED", "K8S_SERVICEACCOUNT_TOKEN_AUTOMOUNT"]),
            ),
            ("No network policy boundary (PSA not enforced)", RuleGroup(&["K8S_POD_SECURITY_ADMISSION_NOT_ENFORCED"])),
        ],
    },
];

static CHAIN_CATALOG: &[ChainDescriptor] = &[
    ChainDescriptor {
        name: "Unmonitored Privilege Escalation Surface",
        score: 65,
        reason: "A privileged container running as root has no monitored boundary preventing privilege escalation inside the cluster.",
        members: &[
            RuleGroup(&["K8S_PRIVILEGED_CONTAINER", "K8S_POD_PRIVILEGED_CONTAINER"]),
            RuleGroup(&["K8S_POD_RUN_AS_ROOT"]),
        ],
    },
    ChainDescriptor {
        name: "Cluster Resource Starvation Risk",
        score: 55,
        reason: "Overallocated nodes paired with namespaces that carry no LimitRange leave the cluster exposed to noisy-neighbor resource starvation.",
        members: &[RuleGroup(&["K8S_NODE_OVERALLOCATED"]), RuleGroup(&["K8S_NAMESPACE_WITHOUT_LIMITS"])],
    },
    ChainDescriptor {
        name: "Weak Identity Boundary",
        score: 40,
        reason: "Default service accounts with automounted tokens give every pod in the namespace an ambient, unscoped credential.",
        members: &[
            RuleGroup(&["K8S_SERVICEACCOUNT_TOKEN_AUTOMOUNT"]),
            RuleGroup(&["K8S_DEFAULT_SERVICEACCOUNT_USED"]),
        ],
    },
];

/// First finding id whose `rule_id` is one of `group`'s members, if any.
fn supporting_finding<'a>(findings: &'a [Finding], group: &RuleGroup) -> Option<&'a Finding> {
    findings.iter().find(|f| group.0.contains(&f.rule_id.as_str()))
}

fn collect_finding_ids(ids: &mut Vec<String>, seen: &mut BTreeSet<String>, finding: &Finding) {
    if seen.insert(finding.id.clone()) {
        ids.push(finding.id.clone());
    }
}

/// Correlates a (already merged) Kubernetes finding set into risk chains and
/// attack paths, sorted by descending score (spec §4.6).
pub fn correlate(findings: &[Finding]) -> Correlation {
    let mut attack_paths = Vec::new();
    for descriptor in ATTACK_PATH_CATALOG {
        let mut finding_ids = Vec::new();
        let mut seen = BTreeSet::new();
        let mut all_layers_supported = true;
        for (_, group) in descriptor.layers {
            match supporting_finding(findings, group) {
                Some(f) => collect_finding_ids(&mut finding_ids, &mut seen, f),
                None => {
                    all_layers_supported = false;
                    break;
                }
            }
        }
        if all_layers_supported {
            attack_paths.push(AttackPath {
                name: descriptor.name.to_string(),
                score: descriptor.score,
                description: descriptor.description.to_string(),
                layers: descriptor.layers.iter().map(|(label, _)| label.to_string()).collect(),
                finding_ids,
            });
        }
    }

    let mut risk_chains = Vec::new();
    for descriptor in CHAIN_CATALOG {
        let mut finding_ids = Vec::new();
        let mut seen = BTreeSet::new();
        let mut all_members_supported = true;
        for group in descriptor.members {
            match supporting_finding(findings, group) {
                Some(f) => collect_finding_ids(&mut finding_ids, &mut seen, f),
                None => {
                    all_members_supported = false;
                    break;
                }
            }
        }
        if all_members_supported {
            risk_chains.push(RiskChain {
                name: descriptor.name.to_string(),
                score: descriptor.score,
                reason: descriptor.reason.to_string(),
                finding_ids,
            });
        }
    }

    attack_paths.sort_by(|a, b| b.score.cmp(&a.score));
    risk_chains.sort_by(|a, b| b.score.cmp(&a.score));

    Correlation { risk_chains, attack_paths }
}

/// Backs the external `explain --score N` command: looks up a single attack
/// path by its reference-catalog score. Risk chains are not addressable this
/// way (spec §6 names only attack paths for `explain`).
pub fn find_attack_path_by_score(score: u32) -> Option<&'static str> {
    ATTACK_PATH_CATALOG.iter().find(|d| d.score == score).map(|d| d.name)
}
