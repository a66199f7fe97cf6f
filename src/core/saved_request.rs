use crate::core::coercion::coerce_value;
use crate::core::dispatcher::Dispatcher;
use crate::domain::model::{CommandResult, Operation, SavedRequest};
use crate::utils::error::Result;
use crate::utils::validation::{validate_machine_name, validate_non_empty_string, Validate};
use serde_json::{Map, Value};

impl SavedRequest {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        service_api: impl Into<String>,
        command_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            service_api: service_api.into(),
            command_name: command_name.into(),
            parameters: Map::new(),
            updated_at: None,
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    /// Stored parameters converted to the types `operation` declares.
    ///
    /// Values entered through a form are kept as text (or lists of text);
    /// they are coerced here the same way fresh operator input is. Already
    /// typed values are passed through.
    pub fn typed_parameters(&self, operation: &Operation) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        for (name, value) in &self.parameters {
            let coerced = match (operation.parameter(name), value) {
                (Some(param), Value::String(text)) => coerce_value(&operation.name, param, Some(text))?,
                (Some(param), Value::Array(items)) if items.iter().all(Value::is_string) => {
                    let joined = items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n");
                    coerce_value(&operation.name, param, Some(&joined))?
                }
                (_, other) => Some(other.clone()),
            };
            if let Some(coerced) = coerced {
                params.insert(name.clone(), coerced);
            }
        }
        Ok(params)
    }

    pub async fn execute(&self, dispatcher: &Dispatcher) -> Result<CommandResult> {
        dispatcher.execute_saved(self).await
    }
}

impl Validate for SavedRequest {
    fn validate(&self) -> Result<()> {
        validate_machine_name("id", &self.id)?;
        validate_non_empty_string("label", &self.label)?;
        validate_non_empty_string("service_api", &self.service_api)?;
        validate_non_empty_string("command_name", &self.command_name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ParamType, Parameter};
    use serde_json::json;

    fn operation() -> Operation {
        let param = |name: &str, param_type, items| Parameter {
            name: name.to_string(),
            param_type,
            required: false,
            default: None,
            description: None,
            location: None,
            sent_as: None,
            items,
        };
        Operation {
            name: "FindPosts".to_string(),
            http_method: "GET".to_string(),
            uri: "/posts".to_string(),
            summary: None,
            parameters: vec![
                param("userId", ParamType::Integer, None),
                param("ids", ParamType::Array, Some(ParamType::Integer)),
            ],
        }
    }

    #[test]
    fn test_typed_parameters() {
        let request = SavedRequest::new("posts_by_user", "Posts by user", "example", "FindPosts")
            .with_parameter("userId", "2")
            .with_parameter("ids", json!(["1", "", "3"]))
            .with_parameter("_sort", "title");

        let params = request.typed_parameters(&operation()).unwrap();
        assert_eq!(params["userId"], json!(2));
        assert_eq!(params["ids"], json!([1, 3]));
        assert_eq!(params["_sort"], json!("title"));
    }

    #[test]
    fn test_blank_integer_is_dropped() {
        let request = SavedRequest::new("posts", "Posts", "example", "FindPosts")
            .with_parameter("userId", "");
        let params = request.typed_parameters(&operation()).unwrap();
        assert!(!params.contains_key("userId"));
    }

    #[test]
    fn test_validate() {
        assert!(SavedRequest::new("ok_id", "Label", "svc", "Op").validate().is_ok());
        assert!(SavedRequest::new("Bad Id", "Label", "svc", "Op").validate().is_err());
        assert!(SavedRequest::new("ok_id", " ", "svc", "Op").validate().is_err());
    }
}
