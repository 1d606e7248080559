//! Hand-written XML-RPC subset for the ROS master API.
//!
//! The master speaks four value types (`int`, `string`, `array`, `struct`
//! plus `boolean` for completeness); a general XML library would be far
//! larger than the protocol itself, so both the emitter and the
//! recursive-descent parser live here.

use deebot_core::{RobotError, Result};
use std::fmt::Write as _;

/// A value in an XML-RPC call or response.
#[derive(Clone, Debug, PartialEq)]
pub enum XmlValue {
	Int(i32),
	Bool(bool),
	Str(String),
	Array(Vec<XmlValue>),
	Struct(Vec<(String, XmlValue)>),
}

impl XmlValue {
	pub fn as_i32(&self) -> Result<i32> {
		match self {
			XmlValue::Int(v) => Ok(*v),
			other => Err(type_error("int", other)),
		}
	}

	pub fn as_str(&self) -> Result<&str> {
		match self {
			XmlValue::Str(v) => Ok(v),
			other => Err(type_error("string", other)),
		}
	}

	pub fn as_array(&self) -> Result<&[XmlValue]> {
		match self {
			XmlValue::Array(v) => Ok(v),
			other => Err(type_error("array", other)),
		}
	}

	/// Array accessor with an index-carrying error message.
	pub fn item(&self, index: usize) -> Result<&XmlValue> {
		self.as_array()?.get(index).ok_or_else(|| {
			RobotError::protocol(format!("XML-RPC array has no element {index}"))
		})
	}
}

fn type_error(expected: &str, got: &XmlValue) -> RobotError {
	let name = match got {
		XmlValue::Int(_) => "int",
		XmlValue::Bool(_) => "boolean",
		XmlValue::Str(_) => "string",
		XmlValue::Array(_) => "array",
		XmlValue::Struct(_) => "struct",
	};
	RobotError::protocol(format!("XML-RPC value: expected {expected}, got {name}"))
}

/// Serializes a method call document.
#[must_use]
pub fn encode_call(method: &str, params: &[XmlValue]) -> String {
	let mut xml = String::with_capacity(256);
	xml.push_str("<?xml version=\"1.0\"?><methodCall><methodName>");
	xml.push_str(&escape(method));
	xml.push_str("</methodName><params>");
	for param in params {
		xml.push_str("<param>");
		write_value(&mut xml, param);
		xml.push_str("</param>");
	}
	xml.push_str("</params></methodCall>");
	xml
}

fn write_value(xml: &mut String, value: &XmlValue) {
	xml.push_str("<value>");
	match value {
		XmlValue::Int(v) => {
			let _ = write!(xml, "<int>{v}</int>");
		}
		XmlValue::Bool(v) => {
			let _ = write!(xml, "<boolean>{}</boolean>", i32::from(*v));
		}
		XmlValue::Str(v) => {
			let _ = write!(xml, "<string>{}</string>", escape(v));
		}
		XmlValue::Array(items) => {
			xml.push_str("<array><data>");
			for item in items {
				write_value(xml, item);
			}
			xml.push_str("</data></array>");
		}
		XmlValue::Struct(members) => {
			xml.push_str("<struct>");
			for (name, member) in members {
				let _ = write!(xml, "<member><name>{}</name>", escape(name));
				write_value(xml, member);
				xml.push_str("</member>");
			}
			xml.push_str("</struct>");
		}
	}
	xml.push_str("</value>");
}

fn escape(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			_ => out.push(c),
		}
	}
	out
}

fn unescape(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(pos) = rest.find('&') {
		out.push_str(&rest[..pos]);
		rest = &rest[pos..];
		let mut matched = false;
		for (entity, c) in [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>'), ("&quot;", '"'), ("&apos;", '\'')] {
			if let Some(tail) = rest.strip_prefix(entity) {
				out.push(c);
				rest = tail;
				matched = true;
				break;
			}
		}
		if !matched {
			// Unknown entity, keep the ampersand verbatim.
			out.push('&');
			rest = &rest[1..];
		}
	}
	out.push_str(rest);
	out
}

/// Parses a method response document into its single return value.
///
/// A `<fault>` response and any malformed document fail with
/// [`RobotError::Protocol`].
pub fn parse_response(xml: &str) -> Result<XmlValue> {
	let mut scanner = Scanner::new(xml);
	scanner.skip_declaration();
	scanner.expect_tag("methodResponse")?;
	scanner.skip_ws();
	if scanner.eat("<fault>") {
		let fault = scanner.parse_value()?;
		return Err(RobotError::protocol(format!("XML-RPC fault: {}", fault_message(&fault))));
	}
	scanner.expect_tag("params")?;
	scanner.expect_tag("param")?;
	let value = scanner.parse_value()?;
	scanner.expect_close("param")?;
	scanner.expect_close("params")?;
	scanner.expect_close("methodResponse")?;
	Ok(value)
}

fn fault_message(fault: &XmlValue) -> String {
	if let XmlValue::Struct(members) = fault {
		let find = |key: &str| {
			members.iter().find(|(name, _)| name == key).map(|(_, v)| v)
		};
		let code = find("faultCode").and_then(|v| v.as_i32().ok()).unwrap_or(0);
		let text = find("faultString")
			.and_then(|v| v.as_str().ok())
			.unwrap_or("unknown fault");
		return format!("{code}: {text}");
	}
	format!("{fault:?}")
}

/// Unwraps the `[code, statusMessage, value]` triple every ROS master
/// method returns. Any code other than 1 becomes `ServiceUnavailable`.
pub fn unwrap_ros_triple(response: XmlValue) -> Result<XmlValue> {
	let items = response.as_array()?;
	if items.len() != 3 {
		return Err(RobotError::protocol(format!(
			"ROS response triple has {} elements",
			items.len()
		)));
	}
	let code = items[0].as_i32()?;
	if code != 1 {
		let status = items[1].as_str().unwrap_or("no status message");
		return Err(RobotError::ServiceUnavailable(format!(
			"master returned code {code}: {status}"
		)));
	}
	Ok(items[2].clone())
}

struct Scanner<'a> {
	text: &'a str,
	pos: usize,
}

impl<'a> Scanner<'a> {
	fn new(text: &'a str) -> Scanner<'a> {
		Scanner { text, pos: 0 }
	}

	fn rest(&self) -> &'a str {
		&self.text[self.pos..]
	}

	fn error(&self, msg: &str) -> RobotError {
		let snippet: String = self.rest().chars().take(24).collect();
		RobotError::protocol(format!("parsing XML-RPC, {msg} at position {}: {snippet}", self.pos))
	}

	fn skip_ws(&mut self) {
		let trimmed = self.rest().trim_start();
		self.pos = self.text.len() - trimmed.len();
	}

	fn skip_declaration(&mut self) {
		self.skip_ws();
		if self.rest().starts_with("<?") {
			if let Some(end) = self.rest().find("?>") {
				self.pos += end + 2;
			}
		}
	}

	fn eat(&mut self, literal: &str) -> bool {
		self.skip_ws();
		if self.rest().starts_with(literal) {
			self.pos += literal.len();
			true
		} else {
			false
		}
	}

	fn expect_tag(&mut self, name: &str) -> Result<()> {
		if self.eat(&format!("<{name}>")) {
			Ok(())
		} else {
			Err(self.error(&format!("expected <{name}>")))
		}
	}

	fn expect_close(&mut self, name: &str) -> Result<()> {
		if self.eat(&format!("</{name}>")) {
			Ok(())
		} else {
			Err(self.error(&format!("expected </{name}>")))
		}
	}

	/// Reads raw character data up to the next `<`.
	fn text_until_tag(&mut self) -> &'a str {
		let rest = self.rest();
		let end = rest.find('<').unwrap_or(rest.len());
		self.pos += end;
		&rest[..end]
	}

	fn parse_value(&mut self) -> Result<XmlValue> {
		self.expect_tag("value")?;
		let value = if self.eat("<int>") {
			let v = self.parse_int("int")?;
			XmlValue::Int(v)
		} else if self.eat("<i4>") {
			let v = self.parse_int("i4")?;
			XmlValue::Int(v)
		} else if self.eat("<boolean>") {
			let text = self.text_until_tag().trim().to_string();
			self.expect_close("boolean")?;
			match text.as_str() {
				"0" => XmlValue::Bool(false),
				"1" => XmlValue::Bool(true),
				_ => return Err(self.error("expected boolean 0 or 1")),
			}
		} else if self.eat("<string>") {
			let text = unescape(self.text_until_tag());
			self.expect_close("string")?;
			XmlValue::Str(text)
		} else if self.eat("<string/>") {
			XmlValue::Str(String::new())
		} else if self.eat("<array>") {
			self.expect_tag("data")?;
			let mut items = Vec::new();
			loop {
				self.skip_ws();
				if self.rest().starts_with("</data>") {
					break;
				}
				items.push(self.parse_value()?);
			}
			self.expect_close("data")?;
			self.expect_close("array")?;
			XmlValue::Array(items)
		} else if self.eat("<struct>") {
			let mut members = Vec::new();
			loop {
				self.skip_ws();
				if self.rest().starts_with("</struct>") {
					break;
				}
				self.expect_tag("member")?;
				self.expect_tag("name")?;
				let name = unescape(self.text_until_tag());
				self.expect_close("name")?;
				let member = self.parse_value()?;
				self.expect_close("member")?;
				members.push((name, member));
			}
			self.expect_close("struct")?;
			XmlValue::Struct(members)
		} else {
			// An untyped <value> is a string per the XML-RPC spec.
			XmlValue::Str(unescape(self.text_until_tag()))
		};
		self.expect_close("value")?;
		Ok(value)
	}

	fn parse_int(&mut self, tag: &str) -> Result<i32> {
		let text = self.text_until_tag().trim().to_string();
		self.expect_close(tag)?;
		text
			.parse::<i32>()
			.map_err(|_| self.error(&format!("invalid integer '{text}'")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encodes_a_lookup_call() {
		let xml = encode_call(
			"lookupService",
			&[
				XmlValue::Str("/caller".to_string()),
				XmlValue::Str("/svc".to_string()),
			],
		);
		assert_eq!(
			xml,
			"<?xml version=\"1.0\"?><methodCall><methodName>lookupService</methodName>\
			<params><param><value><string>/caller</string></value></param>\
			<param><value><string>/svc</string></value></param></params></methodCall>"
		);
	}

	#[test]
	fn parses_a_master_triple() -> Result<()> {
		let xml = "<?xml version='1.0'?><methodResponse><params><param>\
			<value><array><data>\
			<value><int>1</int></value>\
			<value><string>ok</string></value>\
			<value><string>rosrpc://127.0.0.1:38291</string></value>\
			</data></array></value>\
			</param></params></methodResponse>";
		let value = unwrap_ros_triple(parse_response(xml)?)?;
		assert_eq!(value.as_str()?, "rosrpc://127.0.0.1:38291");
		Ok(())
	}

	#[test]
	fn round_trips_nested_arrays() -> Result<()> {
		let original = XmlValue::Array(vec![
			XmlValue::Int(1),
			XmlValue::Str("a & b".to_string()),
			XmlValue::Array(vec![XmlValue::Bool(true), XmlValue::Int(-7)]),
		]);
		let xml = format!(
			"<methodResponse><params><param>{}</param></params></methodResponse>",
			{
				let mut s = String::new();
				write_value(&mut s, &original);
				s
			}
		);
		assert_eq!(parse_response(&xml)?, original);
		Ok(())
	}

	#[test]
	fn struct_values_parse() -> Result<()> {
		let xml = "<methodResponse><params><param><value><struct>\
			<member><name>host</name><value><string>10.0.0.2</string></value></member>\
			<member><name>port</name><value><i4>43291</i4></value></member>\
			</struct></value></param></params></methodResponse>";
		let value = parse_response(xml)?;
		assert_eq!(
			value,
			XmlValue::Struct(vec![
				("host".to_string(), XmlValue::Str("10.0.0.2".to_string())),
				("port".to_string(), XmlValue::Int(43291)),
			])
		);
		Ok(())
	}

	#[test]
	fn malformed_integer_fails() {
		let xml = "<methodResponse><params><param><value><i4>4e3</i4></value></param></params></methodResponse>";
		assert!(parse_response(xml).is_err());
	}

	#[test]
	fn untyped_value_is_a_string() -> Result<()> {
		let xml = "<methodResponse><params><param><value>bare text</value></param></params></methodResponse>";
		assert_eq!(parse_response(xml)?, XmlValue::Str("bare text".to_string()));
		Ok(())
	}

	#[test]
	fn fault_becomes_protocol_error() {
		let xml = "<methodResponse><fault><value><struct>\
			<member><name>faultCode</name><value><int>-1</int></value></member>\
			<member><name>faultString</name><value><string>no such method</string></value></member>\
			</struct></value></fault></methodResponse>";
		let err = parse_response(xml).unwrap_err();
		assert!(err.to_string().contains("no such method"));
	}

	#[test]
	fn non_ok_code_maps_to_service_unavailable() {
		let xml = "<methodResponse><params><param>\
			<value><array><data>\
			<value><int>-1</int></value>\
			<value><string>unknown service</string></value>\
			<value><int>0</int></value>\
			</data></array></value>\
			</param></params></methodResponse>";
		let err = unwrap_ros_triple(parse_response(xml).unwrap()).unwrap_err();
		assert!(matches!(err, RobotError::ServiceUnavailable(_)));
	}

	#[test]
	fn truncated_document_fails() {
		assert!(parse_response("<methodResponse><params><param><value><int>3").is_err());
	}
}
