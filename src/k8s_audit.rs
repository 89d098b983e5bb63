// The `ka` field group: fields of Kubernetes API server audit events.
//
// Every field is an alias for a JSON pointer into the audit event, with an
// optional transform for values that need interpretation (security
// contexts, volumes, query parameters) and constraints on its index.

use crate::alias::{AliasTable, FieldAlias, IndexMode, IndexType};
use crate::error::{EngineError, Result};
use crate::field_check::{BoundField, CheckInfo, FieldSource};
use crate::transform::{BoundIndex, ContainerFlag, Quantifier, SecurityId, Transform};

const CONTAINERS: &str = "/requestObject/spec/containers";
const POD_SPEC: &str = "/requestObject/spec";
const RULES: &str = "/requestObject/rules";

/// The `ka` fields.
#[derive(Debug, Clone)]
pub struct K8sAuditFields {
    info: CheckInfo,
    aliases: AliasTable,
}

impl K8sAuditFields {
    pub fn new() -> Self {
        K8sAuditFields {
            info: CheckInfo::new("ka", "Access K8s Audit Log Events", FIELD_DOCS),
            aliases: build_aliases(),
        }
    }

    pub fn info(&self) -> &CheckInfo {
        &self.info
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Parses a `ka` field at the start of `raw`, taking the longest field
    /// name that ends on a word boundary.
    pub fn parse_field_name(&self, raw: &str) -> Result<Option<(BoundField, usize)>> {
        let Some(m) = self.aliases.parse(raw)? else {
            return Ok(None);
        };

        let index =
            BoundIndex::new(m.alias.transform, &m.index).map_err(|e| EngineError::InvalidGlob {
                raw: raw[..m.consumed].to_string(),
                reason: e.to_string(),
            })?;
        let source = FieldSource::Pointer {
            pointer: m.alias.pointer.clone(),
            transform: m.alias.transform,
        };

        Ok(Some((BoundField::new(m.name, index, source), m.consumed)))
    }
}

impl Default for K8sAuditFields {
    fn default() -> Self {
        Self::new()
    }
}

fn build_aliases() -> AliasTable {
    use FieldAlias as A;
    use IndexMode::{Allowed, Required};
    use IndexType::{Key, Numeric};

    let run_as_user = SecurityId::User;
    let run_as_group = SecurityId::Group;

    AliasTable::new([
        ("ka.auditid", A::new("/auditID")),
        ("ka.stage", A::new("/stage")),
        ("ka.auth.decision", A::new("/annotations/authorization.k8s.io~1decision")),
        ("ka.auth.reason", A::new("/annotations/authorization.k8s.io~1reason")),
        ("ka.user.name", A::new("/user/username")),
        ("ka.user.groups", A::new("/user/groups")),
        ("ka.impuser.name", A::new("/impersonatedUser/username")),
        ("ka.verb", A::new("/verb")),
        ("ka.uri", A::new("/requestURI")),
        ("ka.uri.param", A::indexed("/requestURI", Transform::QueryParam, Required, Key)),
        ("ka.target.name", A::new("/objectRef/name")),
        ("ka.target.namespace", A::new("/objectRef/namespace")),
        ("ka.target.resource", A::new("/objectRef/resource")),
        ("ka.target.subresource", A::new("/objectRef/subresource")),
        ("ka.req.binding.subjects", A::new("/requestObject/subjects")),
        (
            "ka.req.binding.subject.has_name",
            A::indexed("/requestObject/subjects", Transform::HasName, Required, Key),
        ),
        ("ka.req.binding.role", A::new("/requestObject/roleRef/name")),
        ("ka.req.configmap.name", A::new("/objectRef/name")),
        ("ka.req.configmap.obj", A::new("/requestObject/data")),
        ("ka.req.container.image", A::indexed(CONTAINERS, Transform::Image, Allowed, Numeric)),
        (
            "ka.req.container.image.repository",
            A::indexed(CONTAINERS, Transform::Image, Allowed, Numeric),
        ),
        ("ka.req.container.host_ipc", A::new("/requestObject/spec/hostIPC")),
        ("ka.req.container.host_network", A::new("/requestObject/spec/hostNetwork")),
        ("ka.req.container.host_pid", A::new("/requestObject/spec/hostPID")),
        (
            "ka.req.container.host_port.within",
            A::indexed(CONTAINERS, Transform::HostPortWithin, Required, Key),
        ),
        (
            "ka.req.container.privileged",
            A::indexed(
                CONTAINERS,
                Transform::ContainerFlag(ContainerFlag::Privileged),
                Allowed,
                Numeric,
            ),
        ),
        (
            "ka.req.container.allow_privilege_escalation",
            A::indexed(
                CONTAINERS,
                Transform::ContainerFlag(ContainerFlag::AllowPrivilegeEscalation),
                Allowed,
                Numeric,
            ),
        ),
        (
            "ka.req.container.read_write_fs",
            A::indexed(CONTAINERS, Transform::ReadWriteFs, Allowed, Numeric),
        ),
        (
            "ka.req.container.has_run_as_user",
            A::transformed(POD_SPEC, Transform::HasRunAs(run_as_user)),
        ),
        (
            "ka.req.container.run_as_user",
            A::indexed(POD_SPEC, Transform::RunAs(run_as_user), Allowed, Numeric),
        ),
        (
            "ka.req.container.run_as_user.within",
            A::indexed(
                POD_SPEC,
                Transform::RunAsWithin(run_as_user, Quantifier::All),
                Allowed,
                Key,
            ),
        ),
        (
            "ka.req.container.run_as_user.any_within",
            A::indexed(
                POD_SPEC,
                Transform::RunAsWithin(run_as_user, Quantifier::Any),
                Allowed,
                Key,
            ),
        ),
        (
            "ka.req.container.has_run_as_group",
            A::transformed(POD_SPEC, Transform::HasRunAs(run_as_group)),
        ),
        (
            "ka.req.container.run_as_group",
            A::indexed(POD_SPEC, Transform::RunAs(run_as_group), Allowed, Numeric),
        ),
        (
            "ka.req.container.run_as_group.within",
            A::indexed(
                POD_SPEC,
                Transform::RunAsWithin(run_as_group, Quantifier::All),
                Allowed,
                Key,
            ),
        ),
        (
            "ka.req.container.run_as_group.any_within",
            A::indexed(
                POD_SPEC,
                Transform::RunAsWithin(run_as_group, Quantifier::Any),
                Allowed,
                Key,
            ),
        ),
        ("ka.req.role.rules", A::new(RULES)),
        ("ka.req.role.rules.apiGroups", A::indexed(RULES, Transform::Select, Allowed, Numeric)),
        (
            "ka.req.role.rules.nonResourceURLs",
            A::indexed(RULES, Transform::Select, Allowed, Numeric),
        ),
        ("ka.req.role.rules.resources", A::indexed(RULES, Transform::Select, Allowed, Numeric)),
        ("ka.req.role.rules.verbs", A::indexed(RULES, Transform::Select, Allowed, Numeric)),
        ("ka.req.sec_ctx.fs_group", A::new("/requestObject/spec/securityContext/fsGroup")),
        (
            "ka.req.sec_ctx.allow_privilege_escalation",
            A::new("/requestObject/spec/securityContext/allowPrivilegeEscalation"),
        ),
        (
            "ka.req.sec_ctx.supplemental_groups",
            A::new("/requestObject/spec/securityContext/supplementalGroups"),
        ),
        (
            "ka.req.sec_ctx.supplemental_groups.within",
            A::indexed(POD_SPEC, Transform::SupplementalGroupsWithin, Required, Key),
        ),
        (
            "ka.req.sec_ctx.allowed_capabilities.within",
            A::indexed(
                "/requestObject/spec/securityContext/allowedCapabilities",
                Transform::AllowedCapabilities,
                Required,
                Key,
            ),
        ),
        ("ka.req.sec_ctx.proc_mount", A::new("/requestObject/spec/securityContext/procMount")),
        ("ka.req.service.type", A::new("/requestObject/spec/type")),
        (
            "ka.req.service.ports",
            A::indexed("/requestObject/spec/ports", Transform::Generic, Allowed, Numeric),
        ),
        (
            "ka.req.volume.any_hostpath",
            A::indexed(POD_SPEC, Transform::HostPathVolumes(Quantifier::Any), Required, Key),
        ),
        (
            "ka.req.volume.all_hostpath",
            A::indexed(POD_SPEC, Transform::HostPathVolumes(Quantifier::All), Required, Key),
        ),
        (
            "ka.req.volume.hostpath",
            A::indexed(POD_SPEC, Transform::HostPathVolumes(Quantifier::Any), Required, Key),
        ),
        (
            "ka.req.volume.all_flexvolume_drivers",
            A::indexed(POD_SPEC, Transform::FlexVolumeDrivers, Required, Key),
        ),
        (
            "ka.req.volume_types.within",
            A::indexed(POD_SPEC, Transform::VolumeTypes, Required, Key),
        ),
        ("ka.resp.name", A::new("/responseObject/metadata/name")),
        ("ka.response.code", A::new("/responseStatus/code")),
        ("ka.response.reason", A::new("/responseStatus/reason")),
    ])
}

const FIELD_DOCS: &[(&str, &str)] = &[
    ("ka.auditid", "The unique id of the audit event"),
    ("ka.stage", "Stage of the request (e.g. RequestReceived, ResponseComplete, etc.)"),
    ("ka.auth.decision", "The authorization decision"),
    ("ka.auth.reason", "The authorization reason"),
    ("ka.user.name", "The user name performing the request"),
    ("ka.user.groups", "The groups to which the user belongs"),
    ("ka.impuser.name", "The impersonated user name"),
    ("ka.verb", "The action being performed"),
    ("ka.uri", "The request URI as sent from client to server"),
    ("ka.uri.param", "The value of a given query parameter in the uri (e.g. when uri=/foo?key=val, ka.uri.param[key] is val)."),
    ("ka.target.name", "The target object name"),
    ("ka.target.namespace", "The target object namespace"),
    ("ka.target.resource", "The target object resource"),
    ("ka.target.subresource", "The target object subresource"),
    ("ka.req.binding.subjects", "When the request object refers to a cluster role binding, the subject (e.g. account/users) being linked by the binding"),
    ("ka.req.binding.subject.has_name", "When the request object refers to a cluster role binding, return true if a subject with the provided name exists"),
    ("ka.req.binding.role", "When the request object refers to a cluster role binding, the role being linked by the binding"),
    ("ka.req.configmap.name", "If the request object refers to a configmap, the configmap name"),
    ("ka.req.configmap.obj", "If the request object refers to a configmap, the entire configmap object"),
    ("ka.req.container.image", "When the request object refers to a container, the container's images. Can be indexed (e.g. ka.req.container.image[0]). Without any index, returns the first image"),
    ("ka.req.container.image.repository", "The same as req.container.image, but only the repository part (e.g. sysdig/falco)"),
    ("ka.req.container.host_ipc", "When the request object refers to a container, the value of the hostIPC flag."),
    ("ka.req.container.host_network", "When the request object refers to a container, the value of the hostNetwork flag."),
    ("ka.req.container.host_pid", "When the request object refers to a container, the value of the hostPID flag."),
    ("ka.req.container.host_port.within", "When the request object refers to a container, return true if all containers' hostPort values lie within every provided min:max pair (e.g. ka.req.container.host_port.within[100:110])."),
    ("ka.req.container.privileged", "When the request object refers to a container, whether or not any container is run privileged. With an index, return whether or not the ith container is run privileged."),
    ("ka.req.container.allow_privilege_escalation", "When the request object refers to a container, whether or not any container has allowPrivilegeEscalation=true. With an index, return whether or not the ith container has allowPrivilegeEscalation=true."),
    ("ka.req.container.read_write_fs", "When the request object refers to a container, whether or not any container is missing a readOnlyRootFilesystem annotation. With an index, return whether or not the ith container is missing a readOnlyRootFilesystem annotation."),
    ("ka.req.container.has_run_as_user", "When the request object refers to a container, whether a runAsUser is specified either in the security context or in any container's spec"),
    ("ka.req.container.run_as_user", "When the request object refers to a container, the user id used for the container's entrypoint. The security context's runAsUser takes precedence over the container's, defaulting to uid 0 if neither is specified. With an index, return the uid for the ith container, otherwise for the first container"),
    ("ka.req.container.run_as_user.within", "When the request object refers to a container, return true if all containers' uid values (see .run_as_user) lie within every provided min:max pair (e.g. ka.req.container.run_as_user.within[100:110])."),
    ("ka.req.container.run_as_user.any_within", "When the request object refers to a container, return true if any container's uid value (see .run_as_user) lies within every provided min:max pair."),
    ("ka.req.container.has_run_as_group", "When the request object refers to a container, whether a runAsGroup is specified either in the security context or in any container's spec"),
    ("ka.req.container.run_as_group", "When the request object refers to a container, the group id used for the container's entrypoint. The security context's runAsGroup takes precedence over the container's, defaulting to gid 0 if neither is specified. With an index, return the gid for the ith container, otherwise for the first container"),
    ("ka.req.container.run_as_group.within", "When the request object refers to a container, return true if all containers' gid values (see .run_as_group) lie within every provided min:max pair."),
    ("ka.req.container.run_as_group.any_within", "When the request object refers to a container, return true if any container's gid value (see .run_as_group) lies within every provided min:max pair."),
    ("ka.req.role.rules", "When the request object refers to a role/cluster role, the rules associated with the role"),
    ("ka.req.role.rules.apiGroups", "When the request object refers to a role/cluster role, the api groups associated with the role's rules. With an index, return only the api groups from the ith rule. Without an index, return all api groups concatenated"),
    ("ka.req.role.rules.nonResourceURLs", "When the request object refers to a role/cluster role, the non resource urls associated with the role's rules. With an index, return only the non resource urls from the ith rule. Without an index, return all non resource urls concatenated"),
    ("ka.req.role.rules.verbs", "When the request object refers to a role/cluster role, the verbs associated with the role's rules. With an index, return only the verbs from the ith rule. Without an index, return all verbs concatenated"),
    ("ka.req.role.rules.resources", "When the request object refers to a role/cluster role, the resources associated with the role's rules. With an index, return only the resources from the ith rule. Without an index, return all resources concatenated"),
    ("ka.req.sec_ctx.fs_group", "When the request object refers to a pod, the fsGroup gid specified by the security context."),
    ("ka.req.sec_ctx.supplemental_groups", "When the request object refers to a pod, the supplementalGroup gids specified by the security context."),
    ("ka.req.sec_ctx.supplemental_groups.within", "When the request object refers to a pod, return true if all gids in supplementalGroups are within the provided range (e.g. ka.req.sec_ctx.supplemental_groups.within[10:20])."),
    ("ka.req.sec_ctx.allow_privilege_escalation", "When the request object refers to a pod, the value of the allowPrivilegeEscalation flag specified by the security context."),
    ("ka.req.sec_ctx.allowed_capabilities.within", "When the request object refers to a pod, whether the set of allowed capabilities is within the provided list (e.g. ka.req.sec_ctx.allowed_capabilities.within[CAP_KILL])."),
    ("ka.req.sec_ctx.proc_mount", "When the request object refers to a pod, the procMount type specified by the security context."),
    ("ka.req.service.type", "When the request object refers to a service, the service type"),
    ("ka.req.service.ports", "When the request object refers to a service, the service's ports. Can be indexed (e.g. ka.req.service.ports[0]). Without any index, returns all ports"),
    ("ka.req.volume.any_hostpath", "If the request object contains volume definitions, whether or not a hostPath volume exists that mounts the specified path(s) from the host. Multiple comma separated paths or globs may be given (...hostpath[/usr/*] matches /usr/local or /usr/bin)"),
    ("ka.req.volume.all_hostpath", "If the request object contains volume definitions, whether or not all hostPath volumes mount only the specified path(s) from the host. Multiple comma separated paths or globs may be given"),
    ("ka.req.volume.hostpath", "An alias for ka.req.volume.any_hostpath"),
    ("ka.req.volume.all_flexvolume_drivers", "If the request object contains volume definitions, whether or not all Flexvolume drivers are in the provided comma separated set (e.g. ka.req.volume.all_flexvolume_drivers[some-driver])."),
    ("ka.req.volume_types.within", "If the request object contains volume definitions, return whether all volume types are in the provided set (e.g. ka.req.volume_types.within[configMap,downwardAPI])"),
    ("ka.resp.name", "The response object name"),
    ("ka.response.code", "The response code"),
    ("ka.response.reason", "The response reason (usually present only for failures)"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::event::JsonEvent;
    use serde_json::json;

    fn extract(field: &str, body: serde_json::Value) -> String {
        let (f, _) = K8sAuditFields::new()
            .parse_field_name(field)
            .unwrap()
            .unwrap();
        f.extract(&JsonEvent::from_value(body, 0))
    }

    #[test]
    fn test_every_documented_field_is_registered() {
        let fields = K8sAuditFields::new();
        for doc in &fields.info().fields {
            assert!(fields.aliases().get(&doc.name).is_some(), "{}", doc.name);
        }
        assert_eq!(fields.info().fields.len(), fields.aliases().len());
    }

    #[test]
    fn test_verb() {
        assert_eq!(extract("ka.verb", json!({"verb": "create"})), "create");
        assert_eq!(extract("ka.verb", json!({})), "<NA>");
    }

    #[test]
    fn test_auth_decision_escaped_key() {
        let body = json!({"annotations": {"authorization.k8s.io/decision": "allow"}});
        assert_eq!(extract("ka.auth.decision", body), "allow");
    }

    #[test]
    fn test_uri_param() {
        let body = json!({"requestURI": "/api?key=val&x=1"});
        assert_eq!(extract("ka.uri.param[key]", body.clone()), "val");
        assert_eq!(extract("ka.uri.param[nope]", body.clone()), "<NA>");
        assert_eq!(extract("ka.uri", body), "/api?key=val&x=1");
    }

    #[test]
    fn test_image_repository_longest_match() {
        let body = json!({"requestObject": {"spec": {"containers": [
            {"image": "docker.io/sysdig/falco:latest"}
        ]}}});
        assert_eq!(extract("ka.req.container.image", body.clone()), "docker.io/sysdig/falco:latest");
        assert_eq!(extract("ka.req.container.image.repository", body), "sysdig/falco");
    }

    #[test]
    fn test_run_as_user_scenarios() {
        let with_container = json!({"requestObject": {"spec": {"containers": [
            {"securityContext": {"runAsUser": 1000}}
        ]}}});
        assert_eq!(extract("ka.req.container.run_as_user", with_container), "1000");

        let without = json!({"requestObject": {"spec": {"containers": [{"image": "nginx"}]}}});
        assert_eq!(extract("ka.req.container.run_as_user", without), "0");
    }

    #[test]
    fn test_hostpath_scenarios() {
        let etc_config = json!({"requestObject": {"spec": {"volumes": [
            {"name": "cfg", "hostPath": {"path": "/etc/config"}}
        ]}}});
        assert_eq!(extract("ka.req.volume.any_hostpath[/etc]", etc_config.clone()), "false");
        assert_eq!(extract("ka.req.volume.any_hostpath[/etc*]", etc_config), "true");

        let etc = json!({"requestObject": {"spec": {"volumes": [
            {"name": "cfg", "hostPath": {"path": "/etc"}}
        ]}}});
        assert_eq!(extract("ka.req.volume.any_hostpath[/etc]", etc.clone()), "true");
        assert_eq!(extract("ka.req.volume.hostpath[/etc]", etc.clone()), "true");
        assert_eq!(extract("ka.req.volume.all_hostpath[/etc]", etc), "true");
    }

    #[test]
    fn test_run_as_user_within_without_index() {
        let body = json!({"requestObject": {"spec": {"containers": [
            {"securityContext": {"runAsUser": 5000}}
        ]}}});
        assert_eq!(extract("ka.req.container.run_as_user.within", body.clone()), "true");
        assert_eq!(extract("ka.req.container.run_as_user.within[]", body.clone()), "true");
        assert_eq!(extract("ka.req.container.run_as_user.within[0:100]", body), "false");
    }

    #[test]
    fn test_hostpath_globs_bound_once() {
        let (f, _) = K8sAuditFields::new()
            .parse_field_name("ka.req.volume.any_hostpath[/etc*,/proc]")
            .unwrap()
            .unwrap();
        assert_eq!(f.index(), "/etc*,/proc");

        for (path, expected) in [("/etc/shadow", "true"), ("/proc", "true"), ("/var", "false")] {
            let evt = JsonEvent::from_value(
                json!({"requestObject": {"spec": {"volumes": [{"hostPath": {"path": path}}]}}}),
                0,
            );
            assert_eq!(f.extract(&evt), expected, "{}", path);
        }
    }

    #[test]
    fn test_index_constraints() {
        let fields = K8sAuditFields::new();
        assert!(matches!(
            fields.parse_field_name("ka.req.volume.hostpath").unwrap_err(),
            EngineError::RequiresIndex { .. }
        ));
        assert!(matches!(
            fields.parse_field_name("ka.verb[0]").unwrap_err(),
            EngineError::ForbidsIndex { .. }
        ));
        assert!(matches!(
            fields.parse_field_name("ka.req.container.privileged[a]").unwrap_err(),
            EngineError::NonNumericIndex { .. }
        ));
        let (f, len) = fields
            .parse_field_name("ka.req.container.run_as_user.within[0:100] and")
            .unwrap()
            .unwrap();
        assert_eq!(f.field(), "ka.req.container.run_as_user.within");
        assert_eq!(f.index(), "0:100");
        assert_eq!(len, "ka.req.container.run_as_user.within[0:100]".len());
    }

    #[test]
    fn test_role_rules_select() {
        let body = json!({"requestObject": {"rules": [
            {"verbs": ["get", "list"], "resources": ["pods"]},
            {"verbs": ["*"], "resources": ["secrets"]}
        ]}});
        assert_eq!(
            extract("ka.req.role.rules.verbs", body.clone()),
            r#"["get","list"] ["*"]"#
        );
        assert_eq!(extract("ka.req.role.rules.resources[1]", body), r#"["secrets"]"#);
    }

    #[test]
    fn test_binding_subject_has_name() {
        let body = json!({"requestObject": {"subjects": [{"kind": "User", "name": "system:anonymous"}]}});
        assert_eq!(
            extract("ka.req.binding.subject.has_name[system:anonymous]", body.clone()),
            "true"
        );
        assert_eq!(extract("ka.req.binding.subject.has_name[admin]", body), "false");
    }
}
