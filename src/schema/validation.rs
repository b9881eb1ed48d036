use super::error::SchemaError;
use super::schema::{Schema, SchemaKind};

/// 验证值是否符合 Schema，报告第一个不符合的字段
pub fn validate_value(
    schema: &Schema,
    value: &serde_json::Value,
    path: &mut Vec<String>,
) -> std::result::Result<(), SchemaError> {
    match &schema.kind {
        SchemaKind::Null => {
            if !value.is_null() {
                return Err(SchemaError::Validation {
                    message: "expected null".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Boolean => {
            if !value.is_boolean() {
                return Err(SchemaError::Validation {
                    message: "expected boolean".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Integer => {
            if !value.is_i64() {
                return Err(SchemaError::Validation {
                    message: "expected integer".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Number => {
            if !value.is_number() {
                return Err(SchemaError::Validation {
                    message: "expected number".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::String => {
            if !value.is_string() {
                return Err(SchemaError::Validation {
                    message: "expected string".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Enum { values } => {
            let text = value.as_str().ok_or_else(|| SchemaError::Validation {
                message: format!("expected one of {:?}", values),
                path: path.clone(),
            })?;
            if !values.iter().any(|allowed| allowed == text) {
                return Err(SchemaError::Validation {
                    message: format!("`{}` is not one of {:?}", text, values),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Array { items } => {
            if let Some(array) = value.as_array() {
                for (idx, element) in array.iter().enumerate() {
                    path.push(idx.to_string());
                    validate_value(items, element, path)?;
                    path.pop();
                }
            } else {
                return Err(SchemaError::Validation {
                    message: "expected array".to_string(),
                    path: path.clone(),
                });
            }
        }
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => {
            let object = value.as_object().ok_or_else(|| SchemaError::Validation {
                message: "expected object".to_string(),
                path: path.clone(),
            })?;

            for key in required {
                if !object.contains_key(key) {
                    let mut required_path = path.clone();
                    required_path.push(key.clone());
                    return Err(SchemaError::Validation {
                        message: format!("missing required property `{}`", key),
                        path: required_path,
                    });
                }
            }

            for (key, val) in object {
                if let Some(sub_schema) = properties.get(key) {
                    path.push(key.clone());
                    validate_value(sub_schema, val, path)?;
                    path.pop();
                } else if !additional {
                    let mut extra_path = path.clone();
                    extra_path.push(key.clone());
                    return Err(SchemaError::Validation {
                        message: format!("unexpected property `{}`", key),
                        path: extra_path,
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(schema: &Schema, value: &serde_json::Value) -> Result<(), SchemaError> {
        validate_value(schema, value, &mut Vec::new())
    }

    #[test]
    fn enum_accepts_listed_values_only() {
        let schema = Schema::enumeration(["Low", "Medium", "High"]);
        assert!(check(&schema, &json!("High")).is_ok());

        let err = check(&schema, &json!("Critical")).unwrap_err();
        let SchemaError::Validation { message, .. } = err;
        assert!(message.contains("Critical"));
    }

    #[test]
    fn nested_error_path_names_the_field() {
        let schema = Schema::object(
            [(
                "diagnoses",
                Schema::array(Schema::object(
                    [("tier", Schema::enumeration(["Low", "High"]))],
                    &["tier"],
                )),
            )],
            &["diagnoses"],
        );
        let value = json!({ "diagnoses": [ { "tier": "Low" }, {} ] });
        let err = check(&schema, &value).unwrap_err();
        let SchemaError::Validation { path, .. } = err;
        assert_eq!(path, vec!["diagnoses", "1", "tier"]);
    }

    #[test]
    fn required_fields_checked_in_declared_order() {
        let schema = Schema::object(
            [("b", Schema::string()), ("a", Schema::string())],
            &["b", "a"],
        );
        let err = check(&schema, &json!({})).unwrap_err();
        let SchemaError::Validation { path, .. } = err;
        assert_eq!(path, vec!["b"]);
    }
}
