//! 기본 서비스 팩 카탈로그
//!
//! 각 프로브의 이름, 태그 코드, 피처 파일 위치를 정의합니다.
//! 피처 파일 경로: `<features_dir>/service_packs/<pack>[/<provider>]/<probe>/<probe>.feature`

use std::path::{Path, PathBuf};

use probr_core::types::{ProbeDescriptor, ServicePack};

/// 카탈로그에 정의된 프로브
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogProbe {
    /// 서비스 팩
    pub pack: CatalogPack,
    /// 프로브 이름
    pub name: &'static str,
    /// 피처 파일 시나리오 태그 접두어 (예: `"k-gen"`)
    pub tag: &'static str,
}

/// 카탈로그의 서비스 팩
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogPack {
    /// 쿠버네티스
    Kubernetes,
    /// 스토리지
    Storage,
    /// OPA
    Opa,
}

impl CatalogPack {
    /// 모든 기본 서비스 팩
    pub const ALL: [CatalogPack; 3] = [Self::Kubernetes, Self::Storage, Self::Opa];

    /// 코어 도메인 타입으로 변환합니다.
    pub fn service_pack(self) -> ServicePack {
        match self {
            Self::Kubernetes => ServicePack::Kubernetes,
            Self::Storage => ServicePack::Storage,
            Self::Opa => ServicePack::Opa,
        }
    }

    /// 클라우드 제공자 설정이 있어야 등록되는 팩인지 확인합니다.
    pub fn requires_provider(self) -> bool {
        matches!(self, Self::Storage | Self::Opa)
    }

    /// 이 팩의 프로브 목록
    pub fn probes(self) -> &'static [CatalogProbe] {
        match self {
            Self::Kubernetes => KUBERNETES_PROBES,
            Self::Storage => STORAGE_PROBES,
            Self::Opa => OPA_PROBES,
        }
    }
}

const KUBERNETES_PROBES: &[CatalogProbe] = &[
    CatalogProbe {
        pack: CatalogPack::Kubernetes,
        name: "container_registry_access",
        tag: "k-cra",
    },
    CatalogProbe {
        pack: CatalogPack::Kubernetes,
        name: "general",
        tag: "k-gen",
    },
    CatalogProbe {
        pack: CatalogPack::Kubernetes,
        name: "pod_security_policy",
        tag: "k-psp",
    },
    CatalogProbe {
        pack: CatalogPack::Kubernetes,
        name: "internet_access",
        tag: "k-iaf",
    },
    CatalogProbe {
        pack: CatalogPack::Kubernetes,
        name: "iam",
        tag: "k-iam",
    },
];

const STORAGE_PROBES: &[CatalogProbe] = &[
    CatalogProbe {
        pack: CatalogPack::Storage,
        name: "access_whitelisting",
        tag: "s-azaw",
    },
    CatalogProbe {
        pack: CatalogPack::Storage,
        name: "encryption_at_rest",
        tag: "s-azear",
    },
];

const OPA_PROBES: &[CatalogProbe] = &[CatalogProbe {
    pack: CatalogPack::Opa,
    name: "opa_policy",
    tag: "o-pol",
}];

impl CatalogProbe {
    /// 프로브 디스크립터를 생성합니다.
    pub fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(self.pack.service_pack(), self.name)
    }

    /// 피처 파일 경로를 만듭니다. 제공자가 있으면 팩 아래 제공자 디렉토리를 사용합니다.
    pub fn feature_path(&self, features_dir: &Path, provider: Option<&str>) -> PathBuf {
        let mut path = features_dir
            .join("service_packs")
            .join(self.pack.service_pack().as_str());
        if let Some(provider) = provider.map(str::trim).filter(|p| !p.is_empty()) {
            path.push(provider.to_ascii_lowercase());
        }
        path.join(self.name).join(format!("{}.feature", self.name))
    }
}

/// 이름으로 카탈로그 프로브를 찾습니다.
pub fn find(pack: &ServicePack, name: &str) -> Option<&'static CatalogProbe> {
    CatalogPack::ALL
        .into_iter()
        .filter(|p| &p.service_pack() == pack)
        .flat_map(CatalogPack::probes)
        .find(|p| p.name == name)
}

/// 모든 카탈로그 프로브
pub fn all() -> impl Iterator<Item = &'static CatalogProbe> {
    CatalogPack::ALL.into_iter().flat_map(CatalogPack::probes)
}

// ─── Kubernetes tag map ──────────────────────────────────────────────

/// 쿠버네티스 피처 태그 → 시나리오 태그 코드
const KUBERNETES_TAGS: &[(&str, &[&str])] = &[
    ("@probes/kubernetes", &["k-cra", "k-gen", "k-iam", "k-iaf", "k-psp"]),
    ("@probes/kubernetes/general", &["k-gen"]),
    ("@probes/kubernetes/iam", &["k-iam"]),
    ("@probes/kubernetes/internet_access", &["k-iaf"]),
    ("@probes/kubernetes/container_registry_access", &["k-cra"]),
    ("@probes/kubernetes/pod_security_policy", &["k-psp"]),
    ("@category/iam", &["k-iam"]),
    ("@category/internet_access", &["k-iaf"]),
    ("@category/pod_security_policy", &["k-psp"]),
    ("@csp/any", &["k-cra", "k-gen", "k-iam", "k-psp"]),
    ("@csp/azure", &["k-iam-001", "k-iam-002", "k-iam-003"]),
    (
        "@control_type/preventative",
        &[
            "k-cra-001", "k-cra-002", "k-cra-003", "k-iam-001", "k-iam-002", "k-iam-003",
            "k-iaf-001", "k-psp-001", "k-psp-002", "k-psp-003", "k-psp-004", "k-psp-005",
            "k-psp-006", "k-psp-007", "k-psp-008", "k-psp-009", "k-psp-010", "k-psp-011",
            "k-psp-012", "k-psp-013",
        ],
    ),
    (
        "@control_type/inspection",
        &["k-gen-001", "k-gen-002", "k-gen-003", "k-iam-004"],
    ),
    ("@standard/cis", &["k-gen", "k-psp"]),
    ("@standard/cis/gke", &["k-gen", "k-psp"]),
    ("@standard/cis/gke/v1.6.0/5", &["k-psp"]),
    ("@standard/cis/gke/v1.6.0/5.1.3", &["k-gen-001", "k-iam-004"]),
    ("@standard/cis/gke/v1.6.0/5.2", &["k-psp"]),
    ("@standard/cis/gke/v1.6.0/5.2.1", &["k-psp-001"]),
    ("@standard/cis/gke/v1.6.0/5.2.2", &["k-psp-002"]),
    ("@standard/cis/gke/v1.6.0/5.2.3", &["k-psp-003"]),
    ("@standard/cis/gke/v1.6.0/5.2.4", &["k-psp-004"]),
    ("@standard/cis/gke/v1.6.0/5.2.5", &["k-psp-005"]),
    ("@standard/cis/gke/v1.6.0/5.2.6", &["k-psp-006"]),
    ("@standard/cis/gke/v1.6.0/5.2.7", &["k-psp-007", "k-psp-013"]),
    ("@standard/cis/gke/v1.6.0/5.2.8", &["k-psp-008"]),
    ("@standard/cis/gke/v1.6.0/5.2.9", &["k-psp-009"]),
    ("@standard/cis/gke/v1.6.0/5.6.3", &["k-gen-002"]),
    ("@standard/cis/gke/v1.6.0/6", &["k-cra"]),
    ("@standard/cis/gke/v1.6.0/6.1", &["k-cra"]),
    ("@standard/cis/gke/v1.6.0/6.1.3", &["k-cra-001"]),
    ("@standard/cis/gke/v1.6.0/6.1.4", &["k-cra-002"]),
    ("@standard/cis/gke/v1.6.0/6.1.5", &["k-cra-003"]),
    ("@standard/cis/gke/v1.6.0/6.10.1", &["k-gen-003"]),
    ("@standard/citihub", &["k-iam", "k-iaf", "k-psp"]),
    ("@standard/citihub/CHC2-APPDEV135", &["k-cra"]),
    ("@standard/citihub/CHC2-IAM105", &["k-gen-001", "k-iam", "k-psp", "k-iam-004"]),
    ("@standard/citihub/CHC2-ITS115", &["k-gen-003"]),
    ("@standard/citihub/CHC2-ITS120", &["k-cra"]),
    ("@standard/citihub/CHC2-SVD010", &["k-iaf"]),
    ("@standard/none/PSP-0.1", &["k-psp-012"]),
];

/// 쿠버네티스 피처 태그에 대응하는 시나리오 태그 코드를 반환합니다.
///
/// `@` 접두어는 있어도 없어도 됩니다.
pub fn kubernetes_tag_codes(tag: &str) -> Option<&'static [&'static str]> {
    let tag = tag.trim().trim_start_matches('@');
    KUBERNETES_TAGS
        .iter()
        .find(|(t, _)| t.trim_start_matches('@') == tag)
        .map(|(_, codes)| *codes)
}

/// 태그 목록을 태그 맵으로 확장합니다. 원래 태그는 유지되고 중복은 제거됩니다.
pub fn expand_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    let mut push = |t: &str| {
        if !expanded.iter().any(|e| e == t) {
            expanded.push(t.to_owned());
        }
    };
    for tag in tags {
        let tag = tag.as_ref().trim();
        push(tag);
        for code in kubernetes_tag_codes(tag).unwrap_or_default() {
            push(*code);
        }
    }
    expanded
}
